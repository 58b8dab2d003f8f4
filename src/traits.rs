//! The traits at the session's boundaries.
//!
//! [`Controller`] is implemented by the transport glue; the listener traits
//! are implemented by the application. Every listener method has a no-op
//! default so implementations only pick up the capabilities they care about.
//! Listener callbacks run synchronously on the dispatching thread; anything
//! they panic with is caught and logged by the session, never propagated.

use crate::frames::{GoAway, HeadersFrame, Ping, RstStream, Settings, SynReply, SynStream};
use crate::stream::Stream;
use crate::types::DataInfo;
use bytes::Bytes;
use std::sync::Arc;

/// The transport side of a session, provided at construction.
///
/// `write` takes ownership of one serialised frame; the transport must call
/// [`crate::session::Session::write_completed`] once the buffer has been
/// handed to the socket, which is what lets the next queued frame flush.
pub trait Controller: Send + Sync {
    fn write(&self, buffer: Bytes);
    fn close(&self, graceful: bool);
}

/// Session lifecycle notifications.
pub trait SessionListener: Send + Sync {
    fn on_stream_created(&self, _stream: &Arc<Stream>) {}
    fn on_stream_closed(&self, _stream: &Arc<Stream>) {}
}

/// Session-level frame notifications.
pub trait SessionFrameListener: Send + Sync {
    /// A peer-initiated stream arrived. Return a listener to install on the
    /// new stream, or `None` to ignore its frames.
    fn on_syn(
        &self,
        _stream: &Arc<Stream>,
        _frame: &SynStream,
    ) -> Option<Arc<dyn StreamFrameListener>> {
        None
    }

    fn on_rst(&self, _frame: &RstStream) {}

    fn on_settings(&self, _frame: &Settings) {}

    /// A reply to a locally originated PING came back.
    fn on_ping(&self, _frame: &Ping) {}

    fn on_go_away(&self, _frame: &GoAway) {}
}

/// Per-stream frame notifications.
pub trait StreamFrameListener: Send + Sync {
    fn on_reply(&self, _stream: &Arc<Stream>, _frame: &SynReply) {}
    fn on_headers(&self, _stream: &Arc<Stream>, _frame: &HeadersFrame) {}
    fn on_data(&self, _stream: &Arc<Stream>, _data: &DataInfo) {}
}
