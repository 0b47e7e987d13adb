// src/core/protocol/mod.rs

pub mod moss_frame;
pub use moss_frame::{
    BASE_FILE_INDEX, DEFAULT_REPLY_LIMIT, MossCodec, MossFrame, QUERY_RESERVED, ServerReply,
};
