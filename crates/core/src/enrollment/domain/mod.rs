pub mod upload_coordinator;
