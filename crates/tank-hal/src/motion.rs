//! Motion controller client.
//!
//! The tank's steppers hang off a 3D-printer board behind an OctoPrint
//! server.  [`MotionClient`] owns the single link to that server and moves
//! it through `Disconnected → Connected → Initialized`; moves are refused
//! until the bring-up batch has been accepted.
//!
//! The wire is abstracted behind [`MotionTransport`] so the same client runs
//! against the REST API ([`OctoPrintTransport`]) or against nothing at all
//! ([`DryRunTransport`], which only logs and records what would be sent).

use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tank_types::{Axis, TankError};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::retry::FixedBackoff;

/// Status OctoPrint returns when it accepts a command or connect request.
pub const ACCEPTED: StatusCode = StatusCode::NO_CONTENT;

const API_KEY_HEADER: &str = "X-Api-Key";

/// Fixed bring-up batch: 50/50 mixing factors on the two chain motors,
/// commit them to the virtual tool, select that tool, zero both tank axes and
/// release the unused turret stepper.
pub const BRING_UP_SEQUENCE: [&str; 6] = [
    "M163 S0 P0.5",
    "M163 S1 P0.5",
    "M164 S3",
    "T3",
    "G92 E0 Z0",
    "M18 Y",
];

/// Build a rapid move of `axis` to `target` at `feed_rate`.
pub fn linear_move(axis: Axis, target: i64, feed_rate: u32) -> String {
    format!("G0 {}{} F{}", axis.gcode_letter(), target, feed_rate)
}

/// Serial parameters sent with the connect request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    pub port: String,
    pub baudrate: u32,
    pub printer_profile: String,
    /// Persist the parameters as OctoPrint's defaults.
    pub save: bool,
    pub autoconnect: bool,
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            port: "/dev/ttyACM0".to_string(),
            baudrate: 250_000,
            printer_profile: "_default".to_string(),
            save: true,
            autoconnect: true,
        }
    }
}

/// Wire-level access to the motion controller.
pub trait MotionTransport: Send {
    /// Check that the API answers at all.
    ///
    /// # Errors
    ///
    /// [`TankError::NetworkUnready`] when the host cannot be reached yet;
    /// any other error is not retried.
    fn probe(&mut self) -> Result<(), TankError>;

    /// Ask the server to open the serial link to the board.
    fn connect(&mut self, params: &ConnectionParams) -> Result<(), TankError>;

    /// Submit `commands` as one ordered batch.
    fn post_commands(&mut self, commands: &[String]) -> Result<(), TankError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// OctoPrint REST transport
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ConnectRequest<'a> {
    command: &'static str,
    port: &'a str,
    baudrate: u32,
    #[serde(rename = "printerProfile")]
    printer_profile: &'a str,
    save: bool,
    autoconnect: bool,
}

#[derive(Serialize)]
struct CommandRequest<'a> {
    commands: &'a [String],
}

/// Blocking client for the OctoPrint REST API.
pub struct OctoPrintTransport {
    base_url: String,
    api_key: String,
    client: Client,
}

impl OctoPrintTransport {
    /// `base_url` is the API root, e.g. `"http://octopi.local/api"`.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, TankError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TankError::transport("client setup", e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<(), TankError> {
        let response = self
            .client
            .post(self.endpoint(path))
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .map_err(|e| TankError::transport(path, e.to_string()))?;
        let status = response.status();
        if status != ACCEPTED {
            let body = response.text().unwrap_or_default();
            return Err(TankError::transport(
                path,
                format!("expected {ACCEPTED}, got {status}: {}", body.trim()),
            ));
        }
        Ok(())
    }
}

impl MotionTransport for OctoPrintTransport {
    fn probe(&mut self) -> Result<(), TankError> {
        match self
            .client
            .get(self.endpoint("version"))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_connect() => Err(TankError::NetworkUnready(e.to_string())),
            Err(e) => Err(TankError::transport("version", e.to_string())),
        }
    }

    fn connect(&mut self, params: &ConnectionParams) -> Result<(), TankError> {
        self.post(
            "connection",
            &ConnectRequest {
                command: "connect",
                port: &params.port,
                baudrate: params.baudrate,
                printer_profile: &params.printer_profile,
                save: params.save,
                autoconnect: params.autoconnect,
            },
        )
    }

    fn post_commands(&mut self, commands: &[String]) -> Result<(), TankError> {
        self.post("printer/command", &CommandRequest { commands })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Dry-run transport
// ─────────────────────────────────────────────────────────────────────────────

/// Shared record of every batch a [`DryRunTransport`] was asked to send.
pub type SentLog = Arc<Mutex<Vec<Vec<String>>>>;

/// Transport that performs no I/O.  Every call succeeds; command batches are
/// logged and appended to a [`SentLog`].
#[derive(Debug, Default)]
pub struct DryRunTransport {
    sent: SentLog,
}

impl DryRunTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle onto the recorded batches; stays valid after the transport is
    /// moved into a [`MotionClient`].
    pub fn log(&self) -> SentLog {
        Arc::clone(&self.sent)
    }
}

impl MotionTransport for DryRunTransport {
    fn probe(&mut self) -> Result<(), TankError> {
        info!("dry run: skipping API liveness probe");
        Ok(())
    }

    fn connect(&mut self, params: &ConnectionParams) -> Result<(), TankError> {
        info!(port = %params.port, baudrate = params.baudrate, "dry run: skipping printer connect");
        Ok(())
    }

    fn post_commands(&mut self, commands: &[String]) -> Result<(), TankError> {
        info!(?commands, "dry run: would send G-code");
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(commands.to_vec());
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MotionClient
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle of the link to the motion controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connected,
    /// Bring-up batch accepted; moves are allowed.
    Initialized,
}

/// Exclusive handle on the motion controller.
///
/// `send` takes `&mut self`, so at most one batch is ever in flight.
pub struct MotionClient {
    transport: Box<dyn MotionTransport>,
    state: LinkState,
}

impl MotionClient {
    pub fn new(transport: Box<dyn MotionTransport>) -> Self {
        Self {
            transport,
            state: LinkState::Disconnected,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Full startup: wait for the API, connect the printer, run the
    /// bring-up batch.
    pub fn bring_up(
        &mut self,
        params: &ConnectionParams,
        backoff: &FixedBackoff,
        clock: &dyn Clock,
    ) -> Result<(), TankError> {
        self.wait_until_reachable(backoff, clock)?;
        self.connect(params)?;
        self.initialize()
    }

    /// Poll the liveness endpoint until it answers.
    pub fn wait_until_reachable(
        &mut self,
        backoff: &FixedBackoff,
        clock: &dyn Clock,
    ) -> Result<(), TankError> {
        info!(retry_every = ?backoff.interval(), "waiting for OctoPrint API to become alive");
        let transport = &mut self.transport;
        backoff.retry(clock, "octoprint api", || transport.probe())
    }

    /// Open the serial link.  A rejected request is fatal.
    pub fn connect(&mut self, params: &ConnectionParams) -> Result<(), TankError> {
        info!("connecting OctoPrint API to printer");
        self.transport.connect(params)?;
        self.state = LinkState::Connected;
        info!("connected OctoPrint API to printer");
        Ok(())
    }

    /// Send the fixed bring-up batch.  Requires a connected link.
    pub fn initialize(&mut self) -> Result<(), TankError> {
        if self.state == LinkState::Disconnected {
            return Err(TankError::transport(
                "initialize",
                "printer link is not connected",
            ));
        }
        info!("initializing axes");
        let batch: Vec<String> = BRING_UP_SEQUENCE.iter().map(|c| c.to_string()).collect();
        self.transmit(&batch)?;
        self.state = LinkState::Initialized;
        Ok(())
    }

    /// Send an ordered batch of commands.
    ///
    /// # Errors
    ///
    /// [`TankError::Transport`] when the client has not been initialized or
    /// the controller does not accept the batch.
    pub fn send<I, S>(&mut self, commands: I) -> Result<(), TankError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.state != LinkState::Initialized {
            return Err(TankError::transport(
                "send",
                "motion client used before initialization",
            ));
        }
        let batch: Vec<String> = commands.into_iter().map(Into::into).collect();
        if batch.is_empty() {
            return Ok(());
        }
        self.transmit(&batch)
    }

    fn transmit(&mut self, batch: &[String]) -> Result<(), TankError> {
        info!(commands = ?batch, "sending G-code");
        self.transport.post_commands(batch).inspect_err(|e| {
            warn!(error = %e, "motion controller rejected G-code");
        })
    }
}
