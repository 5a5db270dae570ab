use std::rc::Rc;

use futures::{future::LocalBoxFuture, stream::LocalBoxStream};

use super::LocalParticipant;
use crate::{error::PlatformError, proto::Event};

/// Established session connection.
pub struct Connection {
    pub local: Rc<dyn LocalParticipant>,

    /// Session notifications in delivery order.
    pub events: LocalBoxStream<'static, Event>,
}

/// Real-time media session endpoint.
pub trait Transport {
    fn connect(
        &self,
        url: &str,
        token: &str,
    ) -> LocalBoxFuture<'_, Result<Connection, PlatformError>>;
}
