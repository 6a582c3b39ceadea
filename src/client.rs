//! Benchmark client and sweep driver.
//!
//! Opens the control connection once and keeps it for the whole sweep.
//! For every configured message size it sends `MSG_RTT`, waits for the
//! server's `READY`, connects a fresh data channel and times the exchange.
//! A connection benchmark follows the same pattern with `CON_RTT`.
//!
//! Any failure during a run aborts the sweep. Runs that already completed
//! stay in the report; the failed run contributes no samples.

use crate::bench::{con_rtt, msg_rtt};
use crate::buffer::TransferBuffer;
use crate::config::{Benchmark, Config};
use crate::control::ControlChannel;
use crate::data;
use crate::error::BenchError;
use crate::protocol::Command;
use crate::report::{AbortedRun, RunKind, RunResult, SweepReport};
use crate::transport::{Transport, CONTROL_SERVICE};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{error, info};

/// What the client runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub benchmark: Benchmark,
    pub sizes: Vec<usize>,
    pub iterations: usize,
    pub con_iterations: usize,
}

impl Plan {
    pub fn from_config(config: &Config) -> Self {
        Self {
            benchmark: config.benchmark,
            sizes: config.sizes.clone(),
            iterations: config.iterations,
            con_iterations: config.con_iterations,
        }
    }

    /// Runs in execution order.
    pub fn runs(&self) -> Vec<RunKind> {
        let mut runs = Vec::new();
        if matches!(self.benchmark, Benchmark::MsgRtt | Benchmark::All) {
            runs.extend(self.sizes.iter().map(|&size| RunKind::MsgRtt { size }));
        }
        if matches!(self.benchmark, Benchmark::ConRtt | Benchmark::All) {
            runs.push(RunKind::ConRtt);
        }
        runs
    }
}

impl Default for Plan {
    fn default() -> Self {
        Self {
            benchmark: Benchmark::MsgRtt,
            sizes: msg_rtt::DEFAULT_SIZES.to_vec(),
            iterations: msg_rtt::DEFAULT_ITERATIONS,
            con_iterations: con_rtt::DEFAULT_ITERATIONS,
        }
    }
}

/// Client instance
pub struct Client<T: Transport> {
    transport: T,
    plan: Plan,
    buffer: TransferBuffer,
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T, plan: Plan, max_message_size: usize) -> Self {
        Self {
            transport,
            plan,
            buffer: TransferBuffer::new(max_message_size),
        }
    }

    /// Run the plan over one control connection.
    ///
    /// Returns `Err` only if the control connection cannot be opened; run
    /// failures are recorded in the report.
    pub fn run(&mut self) -> Result<SweepReport, BenchError> {
        let stream = self
            .transport
            .connect(CONTROL_SERVICE)
            .map_err(|e| BenchError::setup("control connect", e))?;
        info!(transport = self.transport.name(), "Control connection established");

        let mut control = ControlChannel::new(stream);
        let mut report = SweepReport::new();

        for kind in self.plan.runs() {
            match self.run_one(&mut control, kind) {
                Ok(samples) => {
                    info!(run = %kind, samples = samples.len(), "Run complete");
                    report.completed.push(RunResult { kind, samples });
                }
                Err(e) => {
                    error!(run = %kind, error = %e, "Run aborted");
                    report.aborted = Some(AbortedRun { kind, error: e });
                    break;
                }
            }
        }

        Ok(report)
    }

    fn run_one<S: Read + Write>(
        &mut self,
        control: &mut ControlChannel<S>,
        kind: RunKind,
    ) -> Result<Vec<Duration>, BenchError> {
        match kind {
            RunKind::MsgRtt { size } => {
                let buf = self.buffer.get_mut(size)?;
                control.send(Command::msg_rtt(size)?)?;
                let mut stream = data::connect(&self.transport, control)?;
                Ok(msg_rtt::measure(&mut stream, buf, self.plan.iterations)?)
            }
            RunKind::ConRtt => {
                control.send(Command::con_rtt(self.plan.con_iterations)?)?;
                control.expect_ready()?;
                con_rtt::measure(&self.transport, control, self.plan.con_iterations)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProtocolError;
    use crate::server::{CloseReason, Server};
    use crate::test_util::{free_port, LoopbackStream, MockTransport, ScriptedStream};
    use crate::transport::TcpTransport;
    use std::thread;

    fn ready_words(count: usize) -> Vec<u8> {
        (0..count).flat_map(|_| Command::ready().to_bytes()).collect()
    }

    fn small_plan(sizes: &[usize]) -> Plan {
        Plan {
            sizes: sizes.to_vec(),
            iterations: 25,
            ..Plan::default()
        }
    }

    #[test]
    fn test_plan_runs() {
        let plan = Plan {
            benchmark: Benchmark::All,
            sizes: vec![4, 8],
            ..Plan::default()
        };
        assert_eq!(
            plan.runs(),
            vec![
                RunKind::MsgRtt { size: 4 },
                RunKind::MsgRtt { size: 8 },
                RunKind::ConRtt
            ]
        );

        let plan = Plan {
            benchmark: Benchmark::ConRtt,
            ..Plan::default()
        };
        assert_eq!(plan.runs(), vec![RunKind::ConRtt]);
    }

    #[test]
    fn test_default_sweep_order() {
        let plan = Plan {
            iterations: 2,
            ..Plan::default()
        };
        let sizes = plan.sizes.clone();

        let control = ScriptedStream::new(ready_words(sizes.len()));
        let control_out = control.output();
        let mut transport = MockTransport::new().with_connection(control);
        for _ in &sizes {
            transport = transport.with_connection(LoopbackStream::new().chunked(1));
        }

        let report = Client::new(transport, plan, 4096).run().unwrap();
        assert!(report.is_complete());
        let order: Vec<_> = report.completed.iter().map(|r| r.kind).collect();
        assert_eq!(
            order,
            [4, 8, 16, 32, 64, 128, 256, 512, 1024, 2048, 4096]
                .map(|size| RunKind::MsgRtt { size })
                .to_vec()
        );
        assert!(report.completed.iter().all(|r| r.samples.len() == 2));

        let sent: Vec<Command> = control_out
            .borrow()
            .chunks(4)
            .map(|w| Command::from_bytes(w.try_into().unwrap()).unwrap())
            .collect();
        let expected: Vec<Command> = sizes.iter().map(|&s| Command::msg_rtt(s).unwrap()).collect();
        assert_eq!(sent, expected);
    }

    #[test]
    fn test_receive_error_aborts_sweep() {
        // The third data connection fails part way through its run.
        let transport = MockTransport::new()
            .with_connection(ScriptedStream::new(ready_words(3)))
            .with_connection(LoopbackStream::new())
            .with_connection(LoopbackStream::new())
            .with_connection(LoopbackStream::new().fail_read_after(7));

        let report = Client::new(transport, small_plan(&[4, 8, 16, 32]), 64)
            .run()
            .unwrap();

        assert_eq!(report.completed.len(), 2);
        assert_eq!(report.completed[0].kind, RunKind::MsgRtt { size: 4 });
        assert_eq!(report.completed[0].samples.len(), 25);
        assert_eq!(report.completed[1].kind, RunKind::MsgRtt { size: 8 });
        assert_eq!(report.completed[1].samples.len(), 25);

        let aborted = report.aborted.expect("sweep should abort");
        assert_eq!(aborted.kind, RunKind::MsgRtt { size: 16 });
        assert!(matches!(aborted.error, BenchError::Io(_)));
    }

    #[test]
    fn test_unexpected_reply_aborts_sweep() {
        let reply = Command::msg_rtt(4).unwrap().to_bytes().to_vec();
        let transport = MockTransport::new().with_connection(ScriptedStream::new(reply));
        let report = Client::new(transport, small_plan(&[4, 8]), 64).run().unwrap();

        assert!(report.completed.is_empty());
        let aborted = report.aborted.unwrap();
        assert!(matches!(
            aborted.error,
            BenchError::Protocol(ProtocolError::UnexpectedCommand { .. })
        ));
    }

    #[test]
    fn test_control_connect_failure() {
        match Client::new(MockTransport::new(), Plan::default(), 64).run() {
            Err(BenchError::Setup { op, .. }) => assert_eq!(op, "control connect"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    fn spawn_server(control_port: u16, data_port: u16) -> thread::JoinHandle<crate::server::ServeSummary> {
        thread::spawn(move || {
            let transport = TcpTransport::new("127.0.0.1", control_port, data_port);
            Server::new(transport, 64 * 1024).run().unwrap()
        })
    }

    /// Retry until the server thread is listening.
    fn run_client(transport: TcpTransport, plan: Plan) -> SweepReport {
        let mut client = Client::new(transport, plan, 64 * 1024);
        for _ in 0..100 {
            match client.run() {
                Err(BenchError::Setup { op: "control connect", .. }) => {
                    thread::sleep(Duration::from_millis(20))
                }
                result => return result.unwrap(),
            }
        }
        panic!("server did not start listening");
    }

    #[test]
    fn test_tcp_full_sweep() {
        let (control_port, data_port) = (free_port(), free_port());
        let server = spawn_server(control_port, data_port);

        let plan = Plan {
            benchmark: Benchmark::All,
            sizes: vec![4, 64, 1024, 4096, 32 * 1024],
            iterations: 50,
            con_iterations: 10,
        };
        let transport = TcpTransport::new("127.0.0.1", control_port, data_port);
        let report = run_client(transport, plan);

        assert!(report.is_complete());
        let kinds: Vec<_> = report.completed.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                RunKind::MsgRtt { size: 4 },
                RunKind::MsgRtt { size: 64 },
                RunKind::MsgRtt { size: 1024 },
                RunKind::MsgRtt { size: 4096 },
                RunKind::MsgRtt { size: 32 * 1024 },
                RunKind::ConRtt,
            ]
        );
        for run in &report.completed[..5] {
            assert_eq!(run.samples.len(), 50);
        }
        assert_eq!(report.completed[5].samples.len(), 10);

        let summary = server.join().unwrap();
        assert_eq!(summary.runs_completed, 6);
        assert_eq!(summary.runs_aborted, 0);
        assert_eq!(summary.close_reason, CloseReason::PeerClosed);
    }
}
