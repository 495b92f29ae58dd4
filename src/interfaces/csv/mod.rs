pub mod booking_writer;
pub mod command_reader;
