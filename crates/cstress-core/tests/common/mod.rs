pub mod stress_server;
