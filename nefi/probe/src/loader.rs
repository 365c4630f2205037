//! Loads compiled probe objects, attaches their programs to the kernel
//! hooks named in the attachment table, and decodes each per-CPU ring
//! buffer into typed events (spec §4.1).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use aya::maps::RingBuf;
use aya::programs::{KProbe, TracePoint};
use aya::Ebpf;
use tokio::io::unix::AsyncFd;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use nefi_core::Event;
use nefi_task::{DrainGuard, Shutdown};

use crate::attachment::{Attachment, HookKind, ATTACHMENTS};
use crate::decode::decode_tagged;
use crate::error::ProbeError;

/// Minimum capacity of the channel the decode loops publish onto (spec
/// §4.1: "bounded at >= 4096 entries").
pub const MIN_CHANNEL_CAPACITY: usize = 4096;

#[derive(Default)]
pub struct Counters {
    pub lost_samples: AtomicU64,
    pub decode_errors: AtomicU64,
}

pub struct ProbeLoader {
    object_dir: PathBuf,
    pub counters: Arc<Counters>,
}

impl ProbeLoader {
    pub fn new(object_dir: impl Into<PathBuf>) -> Self {
        Self {
            object_dir: object_dir.into(),
            counters: Arc::new(Counters::default()),
        }
    }

    fn discover_objects(&self) -> std::io::Result<Vec<PathBuf>> {
        if self.object_dir.is_file() {
            return Ok(vec![self.object_dir.clone()]);
        }
        let mut objects = Vec::new();
        for entry in std::fs::read_dir(&self.object_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("o") {
                objects.push(path);
            }
        }
        objects.sort();
        Ok(objects)
    }

    /// Loads every probe object under the configured directory, attaches
    /// every program the attachment table names (best-effort per program),
    /// opens a ring-buffer reader per loaded map, and starts decode loops
    /// that publish onto `tx` until `shutdown` fires.
    ///
    /// Degraded start (some attach failures) succeeds with a warning.
    /// Fatal start (nothing loaded, or no ring buffer opened) reports the
    /// error over `ready` without ever reading `tx`.
    pub async fn start(
        &self,
        shutdown: Shutdown,
        tx: mpsc::Sender<Event>,
        ready: oneshot::Sender<Result<(), ProbeError>>,
    ) {
        let objects = match self.discover_objects() {
            Ok(objects) => objects,
            Err(e) => {
                let _ = ready.send(Err(ProbeError::NoneLoaded(e.to_string())));
                return;
            }
        };

        let mut loaded_any = false;
        let mut opened_any = false;
        let mut drain = DrainGuard::new();
        let mut decode_tasks = Vec::new();

        for path in &objects {
            let mut ebpf = match Ebpf::load_file(path) {
                Ok(ebpf) => ebpf,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to load probe object");
                    continue;
                }
            };
            loaded_any = true;

            for attachment in ATTACHMENTS {
                match attach_one(&mut ebpf, attachment) {
                    Ok(()) => debug!(program = attachment.program, "attached probe program"),
                    Err(e) => warn!(program = attachment.program, error = %e, "failed to attach probe program"),
                }
            }

            let ring_buf = ebpf
                .take_map("EVENTS")
                .ok_or_else(|| anyhow::anyhow!("missing EVENTS map"))
                .and_then(|m| RingBuf::try_from(m).map_err(anyhow::Error::from));
            match ring_buf {
                Ok(map) => {
                    opened_any = true;
                    let counters = self.counters.clone();
                    let tx = tx.clone();
                    let child = shutdown.child();
                    decode_tasks.push(tokio::spawn(decode_loop(map, counters, tx, child)));
                }
                Err(e) => warn!(path = %path.display(), error = %e, "failed to open ring buffer"),
            }

            drain.on_release("probe_object", move || drop(ebpf));
        }

        if !loaded_any {
            let _ = ready.send(Err(ProbeError::NoneLoaded(self.object_dir.display().to_string())));
            return;
        }
        if !opened_any {
            let _ = ready.send(Err(ProbeError::NoRingBuffersOpened));
            return;
        }

        let _ = ready.send(Ok(()));

        shutdown.cancelled().await;
        for task in decode_tasks {
            let _ = task.await;
        }
        drain.release_all();
        drop(tx);
    }
}

fn attach_one(ebpf: &mut Ebpf, attachment: &Attachment) -> anyhow::Result<()> {
    match attachment.hook {
        HookKind::Tracepoint => {
            let program: &mut TracePoint = ebpf
                .program_mut(attachment.program)
                .ok_or_else(|| anyhow::anyhow!("program {} not found", attachment.program))?
                .try_into()?;
            program.load()?;
            program.attach(attachment.group, attachment.symbol)?;
        }
        HookKind::Kprobe => {
            let program: &mut KProbe = ebpf
                .program_mut(attachment.program)
                .ok_or_else(|| anyhow::anyhow!("program {} not found", attachment.program))?
                .try_into()?;
            program.load()?;
            program.attach(attachment.symbol, 0)?;
        }
        HookKind::Kretprobe => {
            let program: &mut KProbe = ebpf
                .program_mut(attachment.program)
                .ok_or_else(|| anyhow::anyhow!("program {} not found", attachment.program))?
                .try_into()?;
            program.load()?;
            program.attach(attachment.symbol, 0)?;
        }
    }
    Ok(())
}

async fn decode_loop(ring_buf: RingBuf<aya::maps::MapData>, counters: Arc<Counters>, tx: mpsc::Sender<Event>, shutdown: Shutdown) {
    let mut async_fd = match AsyncFd::new(ring_buf) {
        Ok(fd) => fd,
        Err(e) => {
            error!(error = %e, "failed to register ring buffer fd");
            return;
        }
    };

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            guard = async_fd.readable_mut() => {
                let mut guard = match guard {
                    Ok(guard) => guard,
                    Err(e) => { error!(error = %e, "ring buffer poll failed"); return; }
                };
                while let Some(item) = guard.get_inner_mut().next() {
                    match Attachment::classify(&item) {
                        Some((kind, port_source)) => match decode_tagged(&item, kind, port_source) {
                            Ok(event) => {
                                if tx.send(event).await.is_err() {
                                    return;
                                }
                            }
                            Err(_) => {
                                counters.decode_errors.fetch_add(1, Ordering::Relaxed);
                            }
                        },
                        None => {
                            counters.decode_errors.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
                guard.clear_ready();
            }
        }
    }
}

impl Attachment {
    /// Classifies a raw ring-buffer record by its length, since a single
    /// `EVENTS` map may carry both record kinds interleaved (spec §6: the
    /// two layouts have distinct fixed sizes).
    fn classify(buf: &[u8]) -> Option<(crate::attachment::RecordKind, crate::attachment::PortSource)> {
        use crate::attachment::{PortSource, RecordKind};
        if buf.len() >= nefi_wire::kernel::request_layout::RECORD_LEN {
            Some((RecordKind::Request, PortSource::SocketRead))
        } else if buf.len() >= nefi_wire::kernel::connection_layout::RECORD_LEN {
            Some((RecordKind::Connection, PortSource::Tracepoint))
        } else {
            None
        }
    }
}

#[allow(dead_code)]
fn default_object_dir() -> &'static Path {
    Path::new("/opt/nefi/bpf")
}
