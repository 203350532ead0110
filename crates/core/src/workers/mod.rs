pub mod background_submission;
