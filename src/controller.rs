//! Controller: frame routing on top of the port reader
//!
//! The [`FrameRouter`] is the [`LineSink`] of the reader. For every line it
//! runs, on the reader thread:
//!
//! 1. parse the line into a frame (malformed lines are skipped)
//! 2. route on the header:
//!    - format header: register a new schema (on failure the old one stays)
//!    - readings header: decode against the current schema (skipped if there
//!      is none yet) and notify listeners
//!    - anything else: skipped
//!
//! Every per-frame error is logged and counted; none of them stops the loop.
//! The [`Controller`] bundles the router with a [`PortReader`].

use crate::backend::{LineSink, PortReader, ReaderEvent, SerialLink, SerialPortLink, StopHandle};
use crate::config::{AppConfig, ProtocolConfig};
use crate::error::{FrameError, Result, TelemetryError};
use crate::listener::{ListenerRegistry, NotifyReport, ReadingListener};
use crate::protocol::{FrameParser, ReadingDecoder, SchemaRegistry};
use crate::types::{ReaderState, Schema};
use crossbeam_channel::Receiver;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// What a successfully routed frame did
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    /// A format frame installed a new schema
    SchemaRegistered(Arc<Schema>),
    /// A readings frame was decoded and delivered
    ReadingDelivered(NotifyReport),
}

/// Counters for one router, snapshot via [`FrameRouter::stats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    /// Lines handed to the router
    pub lines: u64,
    /// Structurally valid frames
    pub frames: u64,
    /// Lines rejected by the frame parser
    pub malformed: u64,
    /// Schemas registered
    pub schemas: u64,
    /// Format frames with an invalid field spec
    pub schema_errors: u64,
    /// Readings decoded and delivered
    pub readings: u64,
    /// Readings frames that failed to decode
    pub decode_errors: u64,
    /// Readings frames that arrived before any schema
    pub missing_schema: u64,
    /// Frames with an unrecognised header
    pub unknown_headers: u64,
    /// Listener `accept` calls that failed
    pub listener_failures: u64,
}

impl RouterStats {
    /// Lines that produced neither a schema nor a reading
    pub fn skipped(&self) -> u64 {
        self.malformed
            + self.schema_errors
            + self.decode_errors
            + self.missing_schema
            + self.unknown_headers
    }
}

#[derive(Debug, Default)]
struct RouterCounters {
    lines: AtomicU64,
    frames: AtomicU64,
    malformed: AtomicU64,
    schemas: AtomicU64,
    schema_errors: AtomicU64,
    readings: AtomicU64,
    decode_errors: AtomicU64,
    missing_schema: AtomicU64,
    unknown_headers: AtomicU64,
    listener_failures: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Routes raw lines to the schema registry or the decoder and listeners
#[derive(Debug)]
pub struct FrameRouter {
    parser: FrameParser,
    decoder: ReadingDecoder,
    schema: SchemaRegistry,
    listeners: ListenerRegistry,
    protocol: ProtocolConfig,
    counters: RouterCounters,
    next_seq: AtomicU64,
}

impl Default for FrameRouter {
    fn default() -> Self {
        Self::new(ProtocolConfig::default())
    }
}

impl FrameRouter {
    pub fn new(protocol: ProtocolConfig) -> Self {
        Self {
            parser: FrameParser::new(),
            decoder: ReadingDecoder::new(),
            schema: SchemaRegistry::new(),
            listeners: ListenerRegistry::new(),
            protocol,
            counters: RouterCounters::default(),
            next_seq: AtomicU64::new(0),
        }
    }

    pub fn schema_registry(&self) -> &SchemaRegistry {
        &self.schema
    }

    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    /// Handle one raw line
    pub fn route_line(&self, line: &str) -> std::result::Result<Routed, FrameError> {
        bump(&self.counters.lines);

        let frame = self.parser.parse(line).inspect_err(|_| {
            bump(&self.counters.malformed);
        })?;
        bump(&self.counters.frames);

        if frame.header == self.protocol.format_header {
            let schema = self.schema.register(&frame.fields).inspect_err(|_| {
                bump(&self.counters.schema_errors);
            })?;
            bump(&self.counters.schemas);
            Ok(Routed::SchemaRegistered(schema))
        } else if frame.header == self.protocol.readings_header {
            let schema = self.schema.current().ok_or_else(|| {
                bump(&self.counters.missing_schema);
                FrameError::MissingSchema
            })?;

            let reading = self
                .decoder
                .decode(&frame.fields, &schema)
                .inspect_err(|_| bump(&self.counters.decode_errors))?
                .with_seq(self.next_seq.fetch_add(1, Ordering::SeqCst));

            let report = self.listeners.notify(&reading);
            bump(&self.counters.readings);
            if report.failed > 0 {
                self.counters
                    .listener_failures
                    .fetch_add(report.failed as u64, Ordering::Relaxed);
            }
            Ok(Routed::ReadingDelivered(report))
        } else {
            bump(&self.counters.unknown_headers);
            Err(FrameError::UnknownHeader(frame.header))
        }
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> RouterStats {
        let c = &self.counters;
        RouterStats {
            lines: c.lines.load(Ordering::Relaxed),
            frames: c.frames.load(Ordering::Relaxed),
            malformed: c.malformed.load(Ordering::Relaxed),
            schemas: c.schemas.load(Ordering::Relaxed),
            schema_errors: c.schema_errors.load(Ordering::Relaxed),
            readings: c.readings.load(Ordering::Relaxed),
            decode_errors: c.decode_errors.load(Ordering::Relaxed),
            missing_schema: c.missing_schema.load(Ordering::Relaxed),
            unknown_headers: c.unknown_headers.load(Ordering::Relaxed),
            listener_failures: c.listener_failures.load(Ordering::Relaxed),
        }
    }
}

impl LineSink for FrameRouter {
    fn on_line(&self, line: &str) {
        match self.route_line(line) {
            Ok(Routed::SchemaRegistered(schema)) => {
                tracing::debug!("Schema now has {} fields", schema.len());
            }
            Ok(Routed::ReadingDelivered(report)) => {
                tracing::trace!(
                    "Reading delivered to {} listeners ({} failed)",
                    report.delivered,
                    report.failed
                );
            }
            Err(FrameError::MissingSchema) => {
                tracing::debug!("Skipping readings frame received before format frame");
            }
            Err(e) => {
                tracing::warn!("Skipping frame: {}", e);
            }
        }
    }
}

/// A complete telemetry session: serial reader plus frame routing
pub struct Controller {
    router: Arc<FrameRouter>,
    reader: PortReader,
    clear_schema_on_start: bool,
}

impl Controller {
    /// Build a controller on top of any link
    pub fn new(config: &AppConfig, link: Box<dyn SerialLink>) -> Self {
        let router = Arc::new(FrameRouter::new(config.protocol.clone()));
        let reader = PortReader::new(link, config.link.reset.clone(), router.clone());
        Self {
            router,
            reader,
            // A reset reboots the device, which then announces its format again
            clear_schema_on_start: config.link.reset.enabled,
        }
    }

    /// Build a controller on the serial port named in the config
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        config.validate()?;
        if config.link.port.is_empty() {
            return Err(TelemetryError::Config(
                "no serial port configured ([link].port)".to_string(),
            ));
        }
        let link = SerialPortLink::from_config(&config.link);
        Ok(Self::new(config, Box::new(link)))
    }

    /// Add a reading listener; may be called while reading
    pub fn register_listener(&self, listener: Arc<dyn ReadingListener>) {
        self.router.listeners().register(listener);
    }

    /// Open the link and start reading
    pub fn start(&mut self) -> Result<()> {
        if self.reader.is_reading() {
            return Ok(());
        }
        if self.clear_schema_on_start {
            self.router.schema_registry().clear();
        }
        self.reader.start()
    }

    /// Stop reading and close the link
    pub fn stop(&mut self) -> Result<()> {
        self.reader.stop()
    }

    /// Block until the session ends
    pub fn wait(&mut self) -> Result<()> {
        self.reader.wait()
    }

    pub fn state(&self) -> ReaderState {
        self.reader.state()
    }

    pub fn events(&self) -> Receiver<ReaderEvent> {
        self.reader.events()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.reader.stop_handle()
    }

    /// Snapshot of the current schema
    pub fn schema(&self) -> Option<Arc<Schema>> {
        self.router.schema_registry().current()
    }

    pub fn stats(&self) -> RouterStats {
        self.router.stats()
    }

    pub fn router(&self) -> &Arc<FrameRouter> {
        &self.router
    }
}
