//! Discovery service: socket lifecycle, receive loop, event delivery.
//!
//! One service instance is single-use: `Created -> Listening -> Stopped`,
//! with no way back. Consumers read the four streams in [`DiscoveryEvents`];
//! when the service stops, every stream reaches end-of-stream.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Mutex, Notify};

use crate::error::{CoreError, Result};
use crate::protocol::tlv;
use crate::types::Device;

/// Default UDP port MNDP announcements arrive on.
pub const DISCOVERY_PORT: u16 = 5678;

/// Read buffer size, standard Ethernet MTU.
const MAX_DATAGRAM_LEN: usize = 1500;

/// Event stream capacities.
const DEVICE_STREAM_CAPACITY: usize = 10;
const ERROR_STREAM_CAPACITY: usize = 5;

/// Address family the socket is opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Family {
    #[default]
    Udp4,
    Udp6,
}

/// Construction-time configuration; immutable for the service's lifetime.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// UDP port to listen on; 0 picks an ephemeral port. Default 5678.
    pub port: Option<u16>,
    /// Host IP to bind to. Default "0.0.0.0", or "::" for `Udp6`.
    pub host: Option<String>,
    /// Address family. Default `Udp4`.
    pub family: Family,
}

/// Lifecycle state of a [`DiscoveryService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Created,
    Listening,
    Stopped,
}

/// Receiving ends of the four event streams, handed to the caller by
/// [`DiscoveryService::new`].
pub struct DiscoveryEvents {
    /// One item per successfully decoded announcement.
    pub devices: mpsc::Receiver<Device>,
    /// Bind, receive, and decode failures.
    pub errors: mpsc::Receiver<CoreError>,
    /// The bound local address, once, on successful start.
    pub started: mpsc::Receiver<SocketAddr>,
    /// One item on shutdown, after which all four streams close.
    pub stopped: mpsc::Receiver<()>,
}

struct EventSenders {
    devices: mpsc::Sender<Device>,
    errors: mpsc::Sender<CoreError>,
    started: mpsc::Sender<SocketAddr>,
    stopped: mpsc::Sender<()>,
}

struct Inner {
    state: ServiceState,
    senders: Option<EventSenders>,
}

/// Passive MNDP listener.
///
/// Each received datagram is decoded in its own spawned task, so device
/// events may be published in a different order than strict reception order.
/// The fan-out is unbounded: a broadcast storm can spawn arbitrarily many
/// short-lived decode tasks.
pub struct DiscoveryService {
    bind_addr: SocketAddr,
    family: Family,
    inner: Mutex<Inner>,
    shutdown: Arc<Notify>,
}

impl DiscoveryService {
    /// Create a service and its event streams.
    ///
    /// The only synchronous failure is a bind host that does not parse as an
    /// IP address; everything else is reported on the error stream.
    pub fn new(options: Options) -> Result<(Self, DiscoveryEvents)> {
        let bind_addr = resolve_bind_addr(&options)?;

        let (device_tx, device_rx) = mpsc::channel(DEVICE_STREAM_CAPACITY);
        let (error_tx, error_rx) = mpsc::channel(ERROR_STREAM_CAPACITY);
        let (started_tx, started_rx) = mpsc::channel(1);
        let (stopped_tx, stopped_rx) = mpsc::channel(1);

        let service = Self {
            bind_addr,
            family: options.family,
            inner: Mutex::new(Inner {
                state: ServiceState::Created,
                senders: Some(EventSenders {
                    devices: device_tx,
                    errors: error_tx,
                    started: started_tx,
                    stopped: stopped_tx,
                }),
            }),
            shutdown: Arc::new(Notify::new()),
        };

        let events = DiscoveryEvents {
            devices: device_rx,
            errors: error_rx,
            started: started_rx,
            stopped: stopped_rx,
        };

        Ok((service, events))
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> ServiceState {
        self.inner.lock().await.state
    }

    /// Bind the socket and launch the receive loop.
    ///
    /// Returns as soon as the loop is running; it never blocks on network
    /// traffic. A bind failure is published on the error stream and leaves
    /// the service in `Created`. Calling `start` on a service that is not
    /// `Created` has no effect.
    pub async fn start(&self) {
        let mut inner = self.inner.lock().await;
        if inner.state != ServiceState::Created {
            return;
        }

        let bound = bind_socket(self.bind_addr, self.family)
            .and_then(|socket| Ok((socket.local_addr()?, socket)));

        match bound {
            Err(source) => {
                if let Some(senders) = inner.senders.as_ref() {
                    let _ = senders
                        .errors
                        .send(CoreError::Bind {
                            addr: self.bind_addr,
                            source,
                        })
                        .await;
                }
            }
            Ok((local_addr, socket)) => {
                inner.state = ServiceState::Listening;
                if let Some(senders) = inner.senders.as_ref() {
                    let _ = senders.started.send(local_addr).await;
                    tokio::spawn(receive_loop(
                        Arc::new(socket),
                        Arc::clone(&self.shutdown),
                        senders.devices.clone(),
                        senders.errors.clone(),
                    ));
                }
            }
        }
    }

    /// Stop listening and close every event stream. Idempotent: only the
    /// first call has any effect.
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        if inner.state == ServiceState::Stopped {
            return;
        }
        inner.state = ServiceState::Stopped;

        // notify_one stores a permit, so the receive loop sees the signal
        // even if it is between select iterations right now.
        self.shutdown.notify_one();

        if let Some(senders) = inner.senders.take() {
            let _ = senders.stopped.send(()).await;
            // Dropping the senders here closes the started and stopped
            // streams; the receive loop drops its device/error clones on
            // exit, closing the other two.
        }
    }
}

/// Resolve the effective bind address from the options and their defaults.
fn resolve_bind_addr(options: &Options) -> Result<SocketAddr> {
    let host = match (options.host.as_deref(), options.family) {
        (None, Family::Udp4) => "0.0.0.0",
        (None, Family::Udp6) => "::",
        // The IPv4 wildcard is meaningless on an IPv6 socket.
        (Some("0.0.0.0"), Family::Udp6) => "::",
        (Some(host), _) => host,
    };

    let ip: IpAddr = host
        .parse()
        .map_err(|_| CoreError::InvalidHost(host.to_string()))?;

    Ok(SocketAddr::new(ip, options.port.unwrap_or(DISCOVERY_PORT)))
}

/// Open a nonblocking UDP socket for the given family and hand it to tokio.
///
/// SO_REUSEADDR is set so a recently closed listener's address can be
/// rebound, but not SO_REUSEPORT: a port already held by a live socket must
/// fail the bind.
fn bind_socket(addr: SocketAddr, family: Family) -> io::Result<UdpSocket> {
    let domain = match family {
        Family::Udp4 => Domain::IPV4,
        Family::Udp6 => Domain::IPV6,
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.set_nonblocking(true)?;

    UdpSocket::from_std(socket.into())
}

/// Errors that mean the transport itself is gone and the loop must exit.
fn is_terminal(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotConnected | io::ErrorKind::BrokenPipe
    )
}

/// Blocking receive loop; runs until shutdown or a terminal receive error.
///
/// Every datagram is copied out of the reusable read buffer and decoded in a
/// freshly spawned task, so the next receive is never held up by decoding or
/// by a slow event consumer.
async fn receive_loop(
    socket: Arc<UdpSocket>,
    shutdown: Arc<Notify>,
    devices: mpsc::Sender<Device>,
    errors: mpsc::Sender<CoreError>,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM_LEN];

    loop {
        tokio::select! {
            _ = shutdown.notified() => break,
            result = socket.recv_from(&mut buf) => match result {
                Ok((len, addr)) => {
                    let datagram = buf[..len].to_vec();
                    let devices = devices.clone();
                    let errors = errors.clone();
                    tokio::spawn(async move {
                        match tlv::parse_announcement(&datagram, addr.ip().to_string()) {
                            Ok(Some(device)) => {
                                let _ = devices.send(device).await;
                            }
                            Ok(None) => {} // Too short to be an announcement.
                            Err(err) => {
                                let _ = errors.send(err.into()).await;
                            }
                        }
                    });
                }
                Err(err) => {
                    let terminal = is_terminal(&err);
                    let _ = errors.send(CoreError::Receive(err)).await;
                    if terminal {
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc::error::TryRecvError;
    use tokio::time::timeout;

    const RECV_TIMEOUT: Duration = Duration::from_secs(5);

    fn loopback_options() -> Options {
        Options {
            port: Some(0),
            host: Some("127.0.0.1".to_string()),
            family: Family::Udp4,
        }
    }

    fn announcement(identity: &[u8]) -> Vec<u8> {
        let mut data = vec![0u8; 4];
        data.extend_from_slice(&5u16.to_be_bytes());
        data.extend_from_slice(&(identity.len() as u16).to_be_bytes());
        data.extend_from_slice(identity);
        data
    }

    async fn recv<T>(rx: &mut mpsc::Receiver<T>) -> Option<T> {
        timeout(RECV_TIMEOUT, rx.recv()).await.expect("stream stalled")
    }

    #[tokio::test]
    async fn start_publishes_bound_address_and_devices() {
        let (service, mut events) = DiscoveryService::new(loopback_options()).unwrap();

        service.start().await;
        let local = recv(&mut events.started).await.unwrap();
        assert_eq!(local.ip().to_string(), "127.0.0.1");
        assert_ne!(local.port(), 0);
        assert_eq!(service.state().await, ServiceState::Listening);

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender
            .send_to(&announcement(b"RB750"), local)
            .await
            .unwrap();

        let device = recv(&mut events.devices).await.unwrap();
        assert_eq!(device.ip, "127.0.0.1");
        assert_eq!(device.identity, "RB750");

        service.stop().await;
    }

    #[tokio::test]
    async fn malformed_datagram_reports_decode_error() {
        let (service, mut events) = DiscoveryService::new(loopback_options()).unwrap();
        service.start().await;
        let local = recv(&mut events.started).await.unwrap();

        // Identity TLV declaring 100 bytes but carrying 3.
        let mut data = vec![0u8; 4];
        data.extend_from_slice(&5u16.to_be_bytes());
        data.extend_from_slice(&100u16.to_be_bytes());
        data.extend_from_slice(b"abc");

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(&data, local).await.unwrap();

        let err = recv(&mut events.errors).await.unwrap();
        assert!(matches!(err, CoreError::Decode(_)));
        assert_eq!(events.devices.try_recv(), Err(TryRecvError::Empty));

        service.stop().await;
    }

    #[tokio::test]
    async fn short_datagram_is_silently_ignored() {
        let (service, mut events) = DiscoveryService::new(loopback_options()).unwrap();
        service.start().await;
        let local = recv(&mut events.started).await.unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(&[0u8; 7], local).await.unwrap();
        sender
            .send_to(&announcement(b"after-noise"), local)
            .await
            .unwrap();

        // The valid announcement comes through; the 7-byte datagram
        // produced neither a device nor an error.
        let device = recv(&mut events.devices).await.unwrap();
        assert_eq!(device.identity, "after-noise");
        assert!(matches!(
            events.errors.try_recv(),
            Err(TryRecvError::Empty)
        ));

        service.stop().await;
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_closes_streams() {
        let (service, mut events) = DiscoveryService::new(loopback_options()).unwrap();
        service.start().await;
        let _ = recv(&mut events.started).await.unwrap();

        service.stop().await;
        service.stop().await;
        assert_eq!(service.state().await, ServiceState::Stopped);

        assert_eq!(recv(&mut events.stopped).await, Some(()));
        assert_eq!(recv(&mut events.stopped).await, None);
        assert_eq!(recv(&mut events.devices).await, None);
        assert!(recv(&mut events.errors).await.is_none());
        assert!(recv(&mut events.started).await.is_none());
    }

    #[tokio::test]
    async fn bind_failure_is_fatal_and_state_stays_created() {
        let holder = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let taken_port = holder.local_addr().unwrap().port();

        let options = Options {
            port: Some(taken_port),
            host: Some("127.0.0.1".to_string()),
            family: Family::Udp4,
        };
        let (service, mut events) = DiscoveryService::new(options).unwrap();
        service.start().await;

        let err = recv(&mut events.errors).await.unwrap();
        assert!(matches!(err, CoreError::Bind { .. }));
        assert_eq!(service.state().await, ServiceState::Created);
        assert_eq!(events.started.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn stop_without_start_still_emits_stopped() {
        let (service, mut events) = DiscoveryService::new(loopback_options()).unwrap();
        service.stop().await;

        assert_eq!(recv(&mut events.stopped).await, Some(()));
        assert_eq!(service.state().await, ServiceState::Stopped);

        // start after stop is a no-op; the started stream is already closed.
        service.start().await;
        assert!(recv(&mut events.started).await.is_none());
    }

    #[test]
    fn invalid_host_fails_construction() {
        let options = Options {
            host: Some("not-an-ip".to_string()),
            ..Options::default()
        };
        match DiscoveryService::new(options) {
            Err(err) => assert!(matches!(err, CoreError::InvalidHost(_))),
            Ok(_) => panic!("construction accepted an invalid host"),
        }
    }

    #[test]
    fn bind_addr_defaults() {
        let addr = resolve_bind_addr(&Options::default()).unwrap();
        assert_eq!(addr.to_string(), "0.0.0.0:5678");

        let v6 = resolve_bind_addr(&Options {
            family: Family::Udp6,
            ..Options::default()
        })
        .unwrap();
        assert_eq!(v6.ip().to_string(), "::");

        // The IPv4 wildcard maps to the IPv6 one under Udp6.
        let mapped = resolve_bind_addr(&Options {
            host: Some("0.0.0.0".to_string()),
            family: Family::Udp6,
            ..Options::default()
        })
        .unwrap();
        assert_eq!(mapped.ip().to_string(), "::");
    }
}
