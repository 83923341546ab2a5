use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;

use crate::{
    protocol::{ProtocolError, ServerCodec, StreamStatus},
    session::{Registration, Session, SessionRegistry},
};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Serves one client stream from first update to final status.
///
/// A clean end of stream tears the session down and answers
/// `success = true`. A transport error tears it down and is returned without
/// a reply. A second stream from an address that already has a session is
/// answered with `success = false` and closed without touching that session.
pub async fn handle_connection<S>(
    io: S,
    client_id: String,
    registry: Arc<SessionRegistry>,
) -> Result<(), ProtocolError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut framed = Framed::new(io, ServerCodec::new());

    let session = match registry.get_or_create(&client_id) {
        Registration::Created(session) => session,
        Registration::Existing(_) => {
            log_warn!("[{}] duplicate connection rejected", client_id);
            framed.send(StreamStatus { success: false }).await?;
            return Ok(());
        }
    };

    log_info!("[{}] client connected", client_id);
    session.start_ticker();

    let outcome = receive_updates(&mut framed, &session).await;

    session.close().await;
    registry.remove(&client_id);

    match outcome {
        Ok(()) => {
            log_info!("[{}] client stream finished, shutting down session", client_id);
            framed.send(StreamStatus { success: true }).await?;
            Ok(())
        }
        Err(err) => {
            log_error!("[{}] error receiving frame update: {err}", client_id);
            Err(err)
        }
    }
}

async fn receive_updates<S>(
    framed: &mut Framed<S, ServerCodec>,
    session: &Session,
) -> Result<(), ProtocolError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(update) = framed.next().await {
        let update = update?;
        session.process_update(&update).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        pipeline::fake::FakeLauncher,
        protocol::{ClientCodec, DetectionEvent, FrameUpdate},
        settings::Settings,
        utils::SystemClock,
    };
    use bytes::Bytes;
    use tokio::io::AsyncWriteExt;

    fn registry() -> Arc<SessionRegistry> {
        Arc::new(SessionRegistry::new(
            Settings::default().session_config(),
            FakeLauncher::new(),
            Arc::new(SystemClock),
        ))
    }

    #[tokio::test]
    async fn clean_end_of_stream_replies_success_and_unregisters() {
        let registry = registry();
        let (client, server) = tokio::io::duplex(64 * 1024);
        let task = tokio::spawn(handle_connection(server, "peer".into(), Arc::clone(&registry)));

        let mut client = Framed::new(client, ClientCodec::new());
        client
            .send(FrameUpdate {
                frame_number: 1,
                events: vec![DetectionEvent {
                    class_id: 0,
                    class_name: "person".into(),
                    timestamp_ms: 0,
                }],
                encoded_frame: Bytes::from_static(b"jpeg"),
            })
            .await
            .unwrap();
        client.get_mut().shutdown().await.unwrap();

        let status = client.next().await.unwrap().unwrap();
        assert!(status.success);
        task.await.unwrap().unwrap();
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn duplicate_stream_is_refused_without_side_effects() {
        let registry = registry();
        let Registration::Created(existing) = registry.get_or_create("peer") else {
            panic!("expected a new session");
        };

        let (client, server) = tokio::io::duplex(1024);
        handle_connection(server, "peer".into(), Arc::clone(&registry))
            .await
            .unwrap();

        let mut client = Framed::new(client, ClientCodec::new());
        let status = client.next().await.unwrap().unwrap();
        assert!(!status.success);
        assert_eq!(registry.len(), 1);
        assert_eq!(
            existing.state().await,
            crate::session::SessionState::Idle
        );
    }

    #[tokio::test]
    async fn malformed_update_ends_the_session_with_an_error() {
        let registry = registry();
        let (mut client, server) = tokio::io::duplex(1024);
        let task = tokio::spawn(handle_connection(server, "peer".into(), Arc::clone(&registry)));

        // Length prefix of 2, then a payload too short for an update header.
        client.write_all(&[0, 0, 0, 2, 0xAB, 0xCD]).await.unwrap();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(ProtocolError::Truncated(_))));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn oversized_frame_ends_the_session() {
        let registry = registry();
        let (mut client, server) = tokio::io::duplex(1024);
        let task = tokio::spawn(handle_connection(server, "peer".into(), Arc::clone(&registry)));

        let too_long = u32::try_from(crate::protocol::MAX_FRAME_LEN + 1).unwrap();
        client.write_all(&too_long.to_be_bytes()).await.unwrap();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(ProtocolError::FrameTooLarge { .. })));
        assert!(registry.is_empty());
    }
}
