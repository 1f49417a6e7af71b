//! Failure taxonomy for the resolver (§4.D, §7).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("query wire length exceeds 512 bytes and TCP is disabled")]
    MessageTooLarge,

    #[error("no DNS servers configured")]
    NoServers,

    #[error("query timed out")]
    Timeout,

    #[error("response id/question did not match the query")]
    MalformedResponse,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("all server attempts failed: {0:?}")]
    AllServersFailed(Vec<Error>),
}
