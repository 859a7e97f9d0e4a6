pub mod mkdir;
