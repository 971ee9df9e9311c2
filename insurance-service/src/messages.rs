//! Status messages shown while a request moves through its lifecycle

pub const REQUEST_SUBMITTING: &str = "Submitting request...";
pub const REQUEST_SUBMITTED: &str = "Request submitted, waiting for the payer to respond...";
pub const ELIGIBLE_SUCCESS: &str = "Request processed successfully";
pub const SOMETHING_WENT_WRONG: &str = "Something went wrong while processing the request";
pub const ELIGIBLE_FAILURE: &str = "No response from the payer, the request timed out";
