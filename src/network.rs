// File: src/network.rs
use crate::audit::AuditSink;
use crate::config::AppConfig;
use crate::error::RelayError;
use crate::sip::router::Router;
use chrono::Local;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tracing::error;

/// UDP transport adapter: receives datagrams, hands them to the router
/// and performs the fire-and-forget send of whatever comes back. The
/// router never touches the socket.
pub async fn listen_and_process(
    config: Arc<AppConfig>,
    router: Arc<Mutex<Router>>,
    audit: Arc<dyn AuditSink>,
) -> Result<(), RelayError> {
    let sock = UdpSocket::bind(config.listen_addr)
        .await
        .map_err(|e| RelayError::SocketBind {
            addr: config.listen_addr,
            source: e,
        })?;
    let sock = Arc::new(sock);

    let mut buf = [0; 65535];
    loop {
        let (len, remote_addr) = sock.recv_from(&mut buf).await?;
        let datagram = buf[..len].to_vec();

        let sock = Arc::clone(&sock);
        let router = Arc::clone(&router);
        let audit = Arc::clone(&audit);

        tokio::spawn(async move {
            // one exclusive pass over registrar + tracker per datagram;
            // lookup-with-eviction and upsert must not interleave
            let output = router.lock().await.handle(&datagram, remote_addr);

            for event in &output.events {
                audit.record(Local::now(), &event.call_id, &event.message);
            }
            if let Some(outbound) = output.outbound {
                if let Err(e) = sock.send_to(&outbound.payload, outbound.dest).await {
                    error!(error = %e, dest = %outbound.dest, "failed to send outbound datagram");
                }
            }
        });
    }
}
