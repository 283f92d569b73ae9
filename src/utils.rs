mod send_errors;

pub use send_errors::SendErrorsExt;
