// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Chain notices and the service that turns them into stored block logs.

pub mod notice;
pub mod block_log_service;

pub use notice::{ChainNotice, FinalizedBlock, NoticeBus, NoticeReceiver};
pub use block_log_service::BlockLogService;
