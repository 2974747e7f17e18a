//! Stream ledger contract interface and the writes the service submits.

use alloy::primitives::Bytes;
use alloy::sol;
use alloy::sol_types::SolCall;

sol! {
    /// On-chain ledger of chat comments, reactions and stream moments.
    interface IStreamLedger {
        function addComment(string username, string message) external;
        function addReaction(string reaction, string streamer) external;
        function mintStreamMoment(string metadata, string streamer) external;
    }
}

/// A contract write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Comment { username: String, message: String },
    Reaction { reaction: String, streamer: String },
    Moment { metadata: String, streamer: String },
}

impl Submission {
    /// Metric / log label.
    pub fn kind(&self) -> &'static str {
        match self {
            Submission::Comment { .. } => "comment",
            Submission::Reaction { .. } => "reaction",
            Submission::Moment { .. } => "moment",
        }
    }

    /// ABI-encoded call data.
    pub fn calldata(&self) -> Bytes {
        let encoded = match self {
            Submission::Comment { username, message } => IStreamLedger::addCommentCall {
                username: username.clone(),
                message: message.clone(),
            }
            .abi_encode(),
            Submission::Reaction { reaction, streamer } => IStreamLedger::addReactionCall {
                reaction: reaction.clone(),
                streamer: streamer.clone(),
            }
            .abi_encode(),
            Submission::Moment { metadata, streamer } => IStreamLedger::mintStreamMomentCall {
                metadata: metadata.clone(),
                streamer: streamer.clone(),
            }
            .abi_encode(),
        };
        Bytes::from(encoded)
    }
}
