//! curl `Handler` for one transaction: body bytes into the sink, response
//! headers and the debug stream into the verbose sibling files.

use crate::sink::Sink;
use curl::easy::{Handler, InfoType, WriteError};
use std::fs::File;
use std::io::Write;

pub struct TransferHandler {
    pub(crate) sink: Sink,
    pub(crate) header_out: Option<File>,
    pub(crate) aux_out: Option<File>,
}

impl TransferHandler {
    pub(crate) fn new(sink: Sink, header_out: Option<File>, aux_out: Option<File>) -> Self {
        Self {
            sink,
            header_out,
            aux_out,
        }
    }
}

impl Handler for TransferHandler {
    fn write(&mut self, data: &[u8]) -> Result<usize, WriteError> {
        match self.sink.write(data) {
            Ok(n) => Ok(n),
            // a short write aborts the transfer; curl reports a write error
            Err(_) => Ok(0),
        }
    }

    fn header(&mut self, data: &[u8]) -> bool {
        if let Some(f) = self.header_out.as_mut() {
            let _ = f.write_all(data);
        }
        true
    }

    fn debug(&mut self, kind: InfoType, data: &[u8]) {
        let f = match self.aux_out.as_mut() {
            Some(f) => f,
            None => return,
        };
        let tag = match kind {
            InfoType::Text => "* ",
            InfoType::HeaderIn => "< ",
            InfoType::HeaderOut => "> ",
            _ => return,
        };
        let _ = f.write_all(tag.as_bytes());
        let _ = f.write_all(data);
    }
}
