pub mod notification_reader;
