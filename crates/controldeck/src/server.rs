//! TCP accept loop serving the deck over HTTP.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::deck::Deck;
use crate::http::{self, HttpError, Request, Response};

const READ_TIMEOUT: Duration = Duration::from_secs(30);

pub type SharedDeck = Arc<Mutex<Deck>>;

/// Accept connections until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, deck: SharedDeck, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let deck = deck.clone();
                    tokio::spawn(handle_connection(stream, peer, deck));
                }
                Err(err) => warn!(?err, "accept failed"),
            },
            _ = &mut shutdown => {
                info!("shutdown requested");
                break;
            }
        }
    }
    Ok(())
}

async fn handle_connection(mut stream: TcpStream, peer: SocketAddr, deck: SharedDeck) {
    let read = tokio::time::timeout(READ_TIMEOUT, http::read_request(&mut stream)).await;
    let response = match read {
        Err(_) => {
            debug!(%peer, "request read timed out");
            return;
        }
        Ok(Ok(request)) => {
            debug!(%peer, method = ?request.method, path = %request.path, "request");
            match tokio::task::spawn_blocking(move || dispatch(&deck, &request)).await {
                Ok(response) => response,
                Err(err) => {
                    warn!(?err, "request handler failed");
                    Response::text(500, "internal error")
                }
            }
        }
        Ok(Err(HttpError::Incomplete)) => return,
        Ok(Err(HttpError::Io(err))) => {
            debug!(%peer, ?err, "request read failed");
            return;
        }
        Ok(Err(err @ (HttpError::HeadTooLarge | HttpError::BodyTooLarge))) => {
            debug!(%peer, %err, "request refused");
            Response::text(413, err.to_string())
        }
        Ok(Err(err)) => Response::bad_request(err.to_string()),
    };
    if let Err(err) = http::write_response(&mut stream, &response).await {
        debug!(%peer, ?err, "response write failed");
    }
}

fn dispatch(deck: &Mutex<Deck>, request: &Request) -> Response {
    let mut deck = match deck.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    deck.handle(request)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use controldeck_core::{load_config, CommandRunner};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::sync::oneshot;

    use super::*;
    use crate::audio::{AudioStateCache, PactlJson};
    use crate::testing::RecordingRunner;

    async fn roundtrip(addr: SocketAddr, raw: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.expect("connect");
        stream.write_all(raw.as_bytes()).await.expect("write");
        let mut out = String::new();
        stream.read_to_string(&mut out).await.expect("read");
        out
    }

    #[tokio::test]
    async fn serves_requests_until_shutdown() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("controldeck.conf");
        fs::write(&path, "[1.button Play]\ncommand = echo hi\n").expect("write");
        let runner: Arc<dyn CommandRunner> = Arc::new(RecordingRunner::default());
        let deck = Deck::new(
            Some(path.clone()),
            load_config(Some(&path)),
            runner,
            Box::new(PactlJson),
            AudioStateCache::default(),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(serve(
            listener,
            Arc::new(Mutex::new(deck)),
            async move {
                let _ = stop_rx.await;
            },
        ));

        let reply = roundtrip(addr, "GET /api/widgets HTTP/1.1\r\nHost: x\r\n\r\n").await;
        assert!(reply.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(reply.contains("\"name\":\"Play\""));

        let reply = roundtrip(addr, "POST /api/button?id=0-0-0 HTTP/1.1\r\n\r\n").await;
        assert!(reply.ends_with(r#"{"alt":false,"state":""}"#));

        let reply = roundtrip(addr, "BROKEN\r\n\r\n").await;
        assert!(reply.starts_with("HTTP/1.1 400 Bad Request\r\n"));

        stop_tx.send(()).expect("stop");
        server.await.expect("join").expect("serve");
    }
}
