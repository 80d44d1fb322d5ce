// SeismoNode: ESP8266 HTTP Bridge
//
// A tiny inbound server plus outbound JSON posts, both driven
// over the one AT transport the bridge owns.

use crate::config::*;
use crate::error::{BridgeError, Result, TransportError};
use crate::events::SensorSample;
use crate::hal::{Clock, SerialPort};
use crate::modem::command::AtCommand;
use crate::modem::frame::{ConnectionFrame, FrameEvent};
use crate::modem::transport::{
    command_name, AtTransport, ALREADY_CONNECTED, ERROR, FAIL, NO_CHANGE, OK, SEND_OK,
    SEND_PROMPT,
};
use crate::net::http::{self, Response, Route};
use crate::net::publish::{Endpoint, Publisher};

/// Whether the modem has a joined network and an armed server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Offline,
    Online,
}

/// What one call to [`HttpBridge::poll`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Idle,
    /// A frame arrived but carried no readable request.
    Dropped,
    Served(Route),
    /// The modem rebooted and the server was armed again.
    Rearmed,
}

/// Latest reading, as reported by `GET /api/sensor`.
#[derive(Debug, Clone, Copy, Default)]
struct Snapshot {
    sample: SensorSample,
    sensor_ok: bool,
}

pub struct HttpBridge<S, C> {
    at: AtTransport<S, C>,
    network: NetworkConfig,
    server: ServerConfig,
    collector: CollectorConfig,
    snapshot: Snapshot,
    link: LinkState,
}

impl<S: SerialPort, C: Clock> HttpBridge<S, C> {
    pub fn new(at: AtTransport<S, C>, config: &NodeConfig) -> Self {
        Self {
            at,
            network: config.network.clone(),
            server: config.server,
            collector: config.collector.clone(),
            snapshot: Snapshot::default(),
            link: LinkState::Offline,
        }
    }

    pub fn transport(&self) -> &AtTransport<S, C> {
        &self.at
    }

    pub fn transport_mut(&mut self) -> &mut AtTransport<S, C> {
        &mut self.at
    }

    pub fn set_sensor_snapshot(&mut self, sample: SensorSample, sensor_ok: bool) {
        self.snapshot = Snapshot { sample, sensor_ok };
    }

    /// Bring the modem up from cold: probe, join the access point, arm the
    /// server. Any handshake failure leaves the link offline.
    pub fn begin(&mut self) -> Result<()> {
        self.link = LinkState::Offline;
        log::info!("Bringing up ESP8266");

        // boot chatter
        self.at.drain_quiet(BOOT_DRAIN_MS)?;

        self.at.exchange(
            &AtCommand::Probe,
            &[OK],
            AT_PROBE_TIMEOUT_MS,
            AT_PROBE_ATTEMPTS,
            AT_RETRY_BACKOFF_MS,
        )?;

        if AT_DISABLE_ECHO {
            self.expect_ok(&AtCommand::EchoOff, &[OK, ERROR], AT_OK_TIMEOUT_MS)?;
        }
        self.expect_ok(&AtCommand::StationMode, &[OK, ERROR], AT_OK_TIMEOUT_MS)?;

        let join = AtCommand::JoinAccessPoint {
            ssid: self.network.ssid,
            password: self.network.password,
        };
        log::info!("Joining access point '{}'", self.network.ssid);
        self.expect_ok(&join, &[OK, FAIL, ERROR], self.network.join_timeout_ms)?;

        self.at.send_command(&AtCommand::QueryAddress)?;
        let reply = self.at.read_bytes(256, RESPONSE_DRAIN_MS)?;
        match station_address(&reply) {
            Some(ip) => log::info!("Station address {}", ip),
            None => log::warn!("Modem did not report a station address"),
        }

        self.start_server()?;
        log::info!("HTTP server listening on port {}", self.server.port);
        Ok(())
    }

    /// Enable multiplexing and (re)arm the TCP server. Safe to repeat; this is
    /// what a modem reboot triggers.
    pub fn start_server(&mut self) -> Result<()> {
        // ERROR here means mux is already on with a server listening
        self.at.send_command(&AtCommand::Multiplex(true))?;
        match self.at.wait_for_any(&[OK, NO_CHANGE, ERROR], AT_OK_TIMEOUT_MS)? {
            Some(0) | Some(1) => {}
            Some(_) => log::debug!("Multiplexing already enabled"),
            None => log::warn!("No reply to AT+CIPMUX=1"),
        }

        // a stale server has to go before the port can be bound again
        self.at.send_command(&AtCommand::Server { port: None })?;
        self.at.wait_for_any(&[OK, ERROR], AT_OK_TIMEOUT_MS)?;

        let arm = AtCommand::Server {
            port: Some(self.server.port),
        };
        if self.at.exchange(&arm, &[OK, NO_CHANGE, ERROR], AT_OK_TIMEOUT_MS, 1, 0)? == 2 {
            return Err(rejected(&arm, ERROR));
        }

        self.at.send_command(&AtCommand::ServerTimeout(self.server.idle_timeout_s))?;
        if !self.at.wait_for(OK, AT_OK_TIMEOUT_MS)? {
            log::warn!("Server idle timeout not confirmed");
        }

        self.at.send_command(&AtCommand::Status)?;
        self.at.drain_quiet(STATUS_DRAIN_MS)?;

        self.link = LinkState::Online;
        Ok(())
    }

    /// One pass of the inbound state machine. An error here is fatal: the
    /// server could not be re-armed after a modem reboot.
    pub fn poll(&mut self) -> Result<PollOutcome> {
        match self.at.poll_frame(self.server.poll_timeout_ms)? {
            FrameEvent::NoFrame => Ok(PollOutcome::Idle),
            FrameEvent::Reboot => {
                log::warn!("ESP8266 rebooted, re-arming server");
                self.link = LinkState::Offline;
                self.start_server()?;
                Ok(PollOutcome::Rearmed)
            }
            FrameEvent::Frame(frame) => self.serve(frame),
        }
    }

    fn serve(&mut self, frame: ConnectionFrame) -> Result<PollOutcome> {
        // anything past the buffer stays on the wire and is skipped as noise
        let want = frame.len.min(self.server.request_buffer_size);
        let request = self.at.read_bytes(want, REQUEST_READ_TIMEOUT_MS)?;
        if request.is_empty() {
            log::debug!("link {}: empty request dropped", frame.id);
            return Ok(PollOutcome::Dropped);
        }

        let route = http::classify(&request);
        log::debug!("link {}: {:?} ({} bytes)", frame.id, route, request.len());

        let response = match route {
            Route::Index => Response::index(),
            Route::SensorApi => Response::json(
                self.snapshot.sample.snapshot_json(self.snapshot.sensor_ok),
            ),
            Route::Favicon => Response::no_content(),
            Route::NotFound => Response::not_found(),
        };

        if let Err(e) = self.send_response(frame.id, &response) {
            log::warn!("link {}: response not delivered: {}", frame.id, e);
        }
        Ok(PollOutcome::Served(route))
    }

    /// Prepare, write and close. A missing `SEND OK` is only logged: the
    /// client may already have what it needs.
    fn send_response(&mut self, link: u8, response: &Response) -> Result<()> {
        let header = response.header();
        self.at.send_command(&AtCommand::Send {
            link,
            len: response.wire_len(),
        })?;

        if !self.at.wait_for(SEND_PROMPT, SEND_PROMPT_TIMEOUT_MS)? {
            self.close(link)?;
            return Err(BridgeError::NoSendPrompt { link });
        }

        self.at.write_raw(header.as_bytes())?;
        self.at.write_raw(response.body.as_bytes())?;

        if !self.at.wait_for(SEND_OK, SEND_ACK_TIMEOUT_MS)? {
            log::warn!("link {}: no SEND OK", link);
        }
        self.close(link)
    }

    /// POST `body` to `http://host:port/path` on the outbound link. The link
    /// is closed afterwards whether or not the post went through.
    pub fn post_json(&mut self, host: &str, port: u16, path: &str, body: &str) -> Result<()> {
        let link = self.collector.link_id;
        let outcome = self.transmit(link, host, port, path, body);
        let closed = self.close(link);
        outcome?;
        closed
    }

    fn transmit(&mut self, link: u8, host: &str, port: u16, path: &str, body: &str) -> Result<()> {
        self.at.send_command(&AtCommand::Connect { link, host, port })?;
        match self
            .at
            .wait_for_any(&[OK, ALREADY_CONNECTED, ERROR], CONNECT_TIMEOUT_MS)?
        {
            Some(0) | Some(1) => {}
            _ => {
                return Err(BridgeError::ConnectFailed {
                    host: host.to_owned(),
                    port,
                })
            }
        }

        let request = http::post_request(host, path, body);
        self.at.send_command(&AtCommand::Send {
            link,
            len: request.len(),
        })?;
        if !self.at.wait_for(SEND_PROMPT, SEND_PROMPT_TIMEOUT_MS)? {
            return Err(BridgeError::NoSendPrompt { link });
        }

        self.at.write_raw(request.as_bytes())?;
        if !self.at.wait_for(SEND_OK, SEND_ACK_TIMEOUT_MS)? {
            return Err(BridgeError::NotAcknowledged { link });
        }

        // the collector's reply is not inspected
        let discarded = self.at.drain_quiet(RESPONSE_DRAIN_MS)?;
        log::debug!("POST {} sent, {} reply bytes discarded", path, discarded);
        Ok(())
    }

    fn close(&mut self, link: u8) -> Result<()> {
        self.at.send_command(&AtCommand::Close { link })?;
        self.at.wait_for_any(&[OK, ERROR], CLOSE_TIMEOUT_MS)?;
        Ok(())
    }

    /// Retried exchange where only `OK` or `no change` counts as success.
    fn expect_ok(
        &mut self,
        command: &AtCommand<'_>,
        tokens: &[&[u8]],
        timeout_ms: u64,
    ) -> Result<()> {
        let index = self.at.exchange(
            command,
            tokens,
            timeout_ms,
            AT_RETRY_ATTEMPTS,
            AT_RETRY_BACKOFF_MS,
        )?;
        match tokens[index] {
            t if t == OK || t == NO_CHANGE => Ok(()),
            t => Err(rejected(command, t)),
        }
    }
}

impl<S: SerialPort, C: Clock> Publisher for HttpBridge<S, C> {
    fn is_online(&self) -> bool {
        self.link == LinkState::Online
    }

    fn publish(&mut self, endpoint: Endpoint, body: &str) -> Result<()> {
        if !self.is_online() {
            return Err(BridgeError::Offline);
        }
        let path = match endpoint {
            Endpoint::Event => self.collector.event_path,
            Endpoint::Status => self.collector.status_path,
        };
        let (host, port) = (self.collector.host, self.collector.port);
        self.post_json(host, port, path, body)
    }
}

fn rejected(command: &AtCommand<'_>, reply: &[u8]) -> BridgeError {
    TransportError::Rejected {
        command: command_name(command),
        reply: String::from_utf8_lossy(reply).trim().to_owned(),
    }
    .into()
}

/// Pull the station IP out of an `AT+CIFSR` reply.
fn station_address(reply: &[u8]) -> Option<&str> {
    const TAG: &[u8] = b"STAIP,\"";
    let start = reply.windows(TAG.len()).position(|w| w == TAG)? + TAG.len();
    let len = reply[start..].iter().position(|&b| b == b'"')?;
    std::str::from_utf8(&reply[start..start + len]).ok()
}
