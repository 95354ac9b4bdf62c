//! Reader thread for one subchannel
//!
//! Each pass blocks on the socket for at most one tick, routes what it
//! read, then runs whatever scheduled work is due. The DTLS handshake and
//! keepalives run here, on the thread that owns the subchannel's inbound
//! path.

use crate::config::KEEPALIVE_INTERVAL;
use crate::event::TransportEvent;
use crate::media_transport::Shared;
use crate::scheduler::{Scheduler, Task};
use ice::{IceOutcome, IceState, MediaFilter};
use logging::Logger;
use network::{DtlsOutcome, DtlsState, PacketKind, classify_packet};
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// What the reader last saw of shared state, valid while the epoch holds.
#[derive(Debug, Clone, Copy)]
struct View {
    epoch: u64,
    filter: MediaFilter,
    ice_state: IceState,
    remote: Option<SocketAddr>,
    media_blocked: bool,
}

pub(crate) struct SubchannelReader {
    subchannel: usize,
    shared: Weak<Shared>,
    scheduler: Scheduler,
    view: View,
    /// Where the last DTLS record came from
    dtls_source: Option<SocketAddr>,
    last_received: Instant,
    timed_out: bool,
    stopped: bool,
    logger: Logger,
}

impl SubchannelReader {
    pub(crate) fn new(subchannel: usize, shared: &Arc<Shared>) -> Self {
        let now = Instant::now();
        let mut scheduler = Scheduler::new();
        if shared.security.is_some() {
            scheduler.schedule(Task::Handshake, shared.config.tick(), now);
        }
        Self {
            subchannel,
            shared: Arc::downgrade(shared),
            scheduler,
            view: View {
                epoch: 0,
                filter: MediaFilter::Only(None),
                ice_state: IceState::Disabled,
                remote: None,
                media_blocked: shared.security.is_some(),
            },
            dtls_source: None,
            last_received: now,
            timed_out: false,
            stopped: false,
            logger: shared
                .logger
                .for_component(&format!("reader-{}", subchannel)),
        }
    }

    pub(crate) fn run(mut self) {
        self.logger.debug("Reader thread started");
        while !self.stopped {
            let Some(shared) = self.shared.upgrade() else {
                break;
            };
            if shared.is_closed() {
                break;
            }

            self.refresh(&shared, Instant::now());
            match shared.sockets[self.subchannel].receive() {
                Ok(Some((data, source))) => self.on_datagram(&shared, &data, source),
                Ok(None) => {}
                Err(e) => {
                    if !shared.is_closed() {
                        shared.fail(self.subchannel, e);
                    }
                    break;
                }
            }
            if !self.stopped {
                self.on_tick(&shared, Instant::now());
            }
        }
        self.logger.debug("Reader thread finished");
    }

    /// Re-reads ICE and DTLS state if anything changed since the last look.
    fn refresh(&mut self, shared: &Shared, now: Instant) {
        let epoch = shared.epoch();
        if epoch == self.view.epoch {
            return;
        }
        let (filter, ice_state, remote) = {
            let ice = shared.ice_read();
            (
                ice.media_filter(self.subchannel)
                    .unwrap_or(MediaFilter::Only(None)),
                ice.state(),
                ice.remote_address(self.subchannel),
            )
        };
        let media_blocked = match &shared.security {
            Some(security) => {
                security.lock_engine(self.subchannel, &self.logger).state() != DtlsState::Established
            }
            None => false,
        };
        self.view = View {
            epoch,
            filter,
            ice_state,
            remote,
            media_blocked,
        };
        self.reconcile_schedule(now);
    }

    fn reconcile_schedule(&mut self, now: Instant) {
        let keepalive = self.view.ice_state == IceState::Completed;
        if keepalive && !self.scheduler.is_scheduled(Task::Keepalive) {
            self.scheduler
                .schedule(Task::Keepalive, KEEPALIVE_INTERVAL, now + KEEPALIVE_INTERVAL);
        } else if !keepalive {
            self.scheduler.cancel(Task::Keepalive);
        }
    }

    fn on_datagram(&mut self, shared: &Shared, data: &[u8], source: SocketAddr) {
        let now = Instant::now();
        self.last_received = now;
        self.timed_out = false;

        match classify_packet(data) {
            PacketKind::Empty => self.logger.trace(&format!("empty datagram from {}", source)),
            PacketKind::Stun => self.on_stun(shared, data, source, now),
            PacketKind::Dtls => {
                if self.accepts(source) {
                    self.on_dtls(shared, data, source, now);
                }
            }
            PacketKind::Media => {
                if self.accepts(source) {
                    self.deliver(shared, data, source);
                }
            }
        }
    }

    fn accepts(&self, source: SocketAddr) -> bool {
        let accepted = self.view.filter.accepts(source);
        if !accepted {
            self.logger
                .trace(&format!("ignoring data from un-selected source {}", source));
        }
        accepted
    }

    fn on_stun(&mut self, shared: &Shared, data: &[u8], source: SocketAddr, now: Instant) {
        let (outcome, changed, rearmed) = {
            let mut ice = shared.ice_write();
            let before = ice.state();
            let outcome = ice.handle_inbound(self.subchannel, data, source, now);
            let rearmed = matches!(outcome, IceOutcome::Consumed { nominated: Some(_), .. })
                && shared.rearm_after_restart(self.subchannel);
            (outcome, ice.state() != before, rearmed)
        };

        match outcome {
            IceOutcome::Consumed { reply, nominated } => {
                if let Some(reply) = reply {
                    shared.send_raw(self.subchannel, &reply, source);
                }
                if rearmed {
                    self.logger
                        .info("new path nominated after ICE restart, DTLS handshake runs again");
                }
                if nominated.is_some() || changed {
                    shared.bump_epoch();
                    self.refresh(shared, now);
                    shared.check_established();
                }
                if let Some(address) = nominated {
                    self.logger
                        .info(&format!("media path now {}", address));
                    self.drive_handshake(shared, now);
                }
            }
            // Looked like STUN but did not parse
            IceOutcome::Forward => self.deliver(shared, data, source),
            IceOutcome::Discard => {}
        }
    }

    fn on_dtls(&mut self, shared: &Shared, data: &[u8], source: SocketAddr, now: Instant) {
        let Some(security) = &shared.security else {
            self.deliver(shared, data, source);
            return;
        };
        self.dtls_source = Some(source);

        let (outcome, packets, keys, state) = {
            let mut engine = security.lock_engine(self.subchannel, &self.logger);
            let outcome = engine.handle_datagram(data, now);
            let keys = match outcome {
                DtlsOutcome::Established => engine.take_keys(),
                _ => None,
            };
            (outcome, engine.take_pending_packets(), keys, engine.state())
        };
        let was_live = !self.view.media_blocked;
        self.view.media_blocked = state != DtlsState::Established;
        self.flush(shared, packets);
        if was_live && state == DtlsState::Handshaking {
            // The peer started over on a live association
            shared.bump_epoch();
            shared.check_established();
        }

        match outcome {
            DtlsOutcome::Forward => self.deliver(shared, data, source),
            outcome => self.on_dtls_outcome(shared, outcome, keys),
        }
    }

    fn on_dtls_outcome(
        &mut self,
        shared: &Shared,
        outcome: DtlsOutcome,
        keys: Option<network::KeyInfoPair>,
    ) {
        match outcome {
            DtlsOutcome::Consumed | DtlsOutcome::Forward => {}
            DtlsOutcome::Discard => self
                .logger
                .trace("dropping media received during DTLS handshake"),
            DtlsOutcome::Established => {
                shared.handshake_completed(self.subchannel, keys);
                shared.bump_epoch();
                shared.check_established();
            }
            DtlsOutcome::Failed(error) => {
                self.logger
                    .warn(&format!("DTLS handshake failed: {}", error));
                shared.emit(TransportEvent::HandshakeFailed {
                    subchannel: self.subchannel,
                    error,
                });
                shared.check_established();
            }
            DtlsOutcome::Closed => {
                self.logger.info("peer closed the DTLS association");
                shared.association_closed(self.subchannel);
                shared.emit(TransportEvent::Closed {
                    subchannel: self.subchannel,
                });
                shared.check_established();
                self.stopped = true;
            }
        }
    }

    /// Starts the client handshake once a remote path exists, otherwise
    /// lets a running handshake retransmit or time out.
    fn drive_handshake(&mut self, shared: &Shared, now: Instant) {
        let Some(security) = &shared.security else {
            return;
        };
        let (outcome, packets, keys, state) = {
            let mut engine = security.lock_engine(self.subchannel, &self.logger);
            let outcome = match engine.state() {
                DtlsState::Idle
                    if !engine.role().is_server()
                        && engine.remote_fingerprint().is_some()
                        && self.view.remote.is_some() =>
                {
                    Some(engine.start(now).unwrap_or_else(DtlsOutcome::Failed))
                }
                DtlsState::Handshaking => engine.poll(now),
                _ => None,
            };
            let keys = match outcome {
                Some(DtlsOutcome::Established) => engine.take_keys(),
                _ => None,
            };
            (outcome, engine.take_pending_packets(), keys, engine.state())
        };
        self.view.media_blocked = state != DtlsState::Established;
        self.flush(shared, packets);
        if let Some(outcome) = outcome {
            self.on_dtls_outcome(shared, outcome, keys);
        }
    }

    /// Sends handshake output to the selected path, or back to whoever
    /// sent the last record when nothing is selected yet.
    fn flush(&self, shared: &Shared, packets: Vec<Vec<u8>>) {
        if packets.is_empty() {
            return;
        }
        let Some(target) = self.view.remote.or(self.dtls_source) else {
            self.logger
                .debug("DTLS output dropped, no remote address yet");
            return;
        };
        for packet in packets {
            shared.send_raw(self.subchannel, &packet, target);
        }
    }

    fn deliver(&self, shared: &Shared, data: &[u8], source: SocketAddr) {
        if self.view.media_blocked {
            self.logger
                .trace("dropping media before DTLS handshake completes");
            return;
        }
        shared.emit(TransportEvent::Media {
            subchannel: self.subchannel,
            source,
            data: data.to_vec(),
        });
    }

    fn on_tick(&mut self, shared: &Shared, now: Instant) {
        for task in self.scheduler.due(now) {
            match task {
                Task::Handshake => self.drive_handshake(shared, now),
                Task::Keepalive => {
                    let keepalive = shared.ice_read().keepalive(self.subchannel);
                    if let Some((target, indication)) = keepalive {
                        shared.send_raw(self.subchannel, &indication, target);
                    }
                }
            }
        }

        let timeout = self.read_timeout(shared);
        if !self.timed_out && now.saturating_duration_since(self.last_received) >= timeout {
            self.timed_out = true;
            self.logger
                .warn(&format!("nothing received for {:?}", timeout));
            shared.emit(TransportEvent::Timeout {
                subchannel: self.subchannel,
            });
        }
    }

    /// Media timeout once a path is settled, ICE timeout while negotiating.
    fn read_timeout(&self, shared: &Shared) -> Duration {
        if self.view.ice_state.is_negotiating() {
            shared.config.ice_timeout()
        } else {
            shared.config.media_timeout()
        }
    }
}
