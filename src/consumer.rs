//! The worker side of the kernel protocol.
//!
//! A [`Consumer`] owns one [`Interpreter`] and drains a queue of program texts,
//! pushing exactly one result expression per submission. Evaluation errors are turned
//! into error expressions and roll the environment back to its state before the
//! submission. A [`Kernel`] owns the queues and the worker thread running the consumer.

use crate::atom::Atom;
use crate::expression::Expression;
use crate::interpreter::Interpreter;
use crate::interrupt::Interrupt;
use crate::queue::ThreadSafeQueue;
use crate::{DEFAULT_STARTUP, Error};
use std::sync::{Arc, mpsc};
use std::thread::{self, JoinHandle};

/// Queue of submitted program texts and control tokens
pub type InputQueue = Arc<ThreadSafeQueue<String>>;
/// Queue of results, one per evaluated submission
pub type OutputQueue = Arc<ThreadSafeQueue<Expression>>;

/// Message pushed when a submission does not parse
pub const PARSE_FAILURE: &str = "Error: Invalid Expression. Could not parse.";

/// Strings with a fixed meaning on the input queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlToken {
    Start,
    Stop,
    Reset,
    Exit,
}

impl ControlToken {
    /// Recognize an exact control string
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "%start" => Some(ControlToken::Start),
            "%stop" => Some(ControlToken::Stop),
            "%reset" => Some(ControlToken::Reset),
            "%exit" => Some(ControlToken::Exit),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ControlToken::Start => "%start",
            ControlToken::Stop => "%stop",
            ControlToken::Reset => "%reset",
            ControlToken::Exit => "%exit",
        }
    }
}

/// Wrap a message as an error result
fn error_result(message: impl Into<String>) -> Expression {
    Expression::new(Atom::error(message))
}

/// Error result describing a failed startup program
pub fn startup_failure(err: &Error) -> Expression {
    match err {
        Error::ParseError(_) => error_result("Error: Invalid Startup. Could not parse."),
        other => error_result(format!("Error: Invalid Startup. {other}")),
    }
}

/// Evaluation loop over an input queue
pub struct Consumer {
    interpreter: Interpreter,
    input: InputQueue,
    output: OutputQueue,
}

impl Consumer {
    pub fn new(interpreter: Interpreter, input: InputQueue, output: OutputQueue) -> Self {
        Consumer {
            interpreter,
            input,
            output,
        }
    }

    /// Process submissions until `%stop`, then hand back the interpreter
    pub fn run(mut self) -> Interpreter {
        loop {
            let text = self.input.wait_and_pop();
            match ControlToken::parse(&text) {
                Some(ControlToken::Stop) => {
                    log::debug!("consumer stopping");
                    break;
                }
                Some(token) => {
                    log::debug!("consumer ignoring control token {}", token.as_str());
                }
                None => {
                    let result = self.evaluate(&text);
                    self.output.push(result);
                }
            }
        }
        self.interpreter
    }

    /// Evaluate one submission, restoring the environment if evaluation fails
    fn evaluate(&mut self, text: &str) -> Expression {
        if let Err(err) = self.interpreter.parse_str(text) {
            log::debug!("submission did not parse: {}", err.message);
            return error_result(PARSE_FAILURE);
        }

        let snapshot = self.interpreter.env().clone();
        match self.interpreter.evaluate() {
            Ok(result) => result,
            Err(err) => {
                if err == Error::Interrupted {
                    log::debug!("evaluation interrupted, rolling back environment");
                }
                self.interpreter.set_env(snapshot);
                error_result(err.to_string())
            }
        }
    }
}

/// Worker thread configuration
#[derive(Debug, Clone)]
pub struct KernelConfig {
    /// Program evaluated once in every fresh interpreter
    pub startup: Option<String>,
    /// Stack size of the worker thread; bounds how deep evaluation can recurse
    pub stack_size: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        KernelConfig {
            startup: Some(DEFAULT_STARTUP.to_owned()),
            stack_size: 64 * 1024 * 1024,
        }
    }
}

/// Owner of the queues and of the worker thread evaluating submissions
pub struct Kernel {
    config: KernelConfig,
    input: InputQueue,
    output: OutputQueue,
    interrupt: Interrupt,
    worker: Option<JoinHandle<Interpreter>>,
    /// Interpreter of a stopped worker, reused by the next start
    parked: Option<Interpreter>,
}

impl Kernel {
    /// A stopped kernel; call [`Kernel::start`] to spawn the worker
    pub fn new(config: KernelConfig) -> Self {
        Kernel {
            config,
            input: Arc::new(ThreadSafeQueue::new()),
            output: Arc::new(ThreadSafeQueue::new()),
            interrupt: Interrupt::new(),
            worker: None,
            parked: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Spawn the worker if none is running.
    ///
    /// The worker resumes the interpreter of the last stopped worker, or builds a fresh
    /// one and evaluates the startup program in it. A failed startup is reported on the
    /// output queue and the worker runs on with whatever the startup managed to define.
    /// Returns once the startup program has been evaluated, so a startup failure is
    /// always queued ahead of the first result.
    pub fn start(&mut self) -> Result<(), Error> {
        if self.worker.is_some() {
            return Ok(());
        }

        let parked = self.parked.take();
        let startup = self.config.startup.clone();
        let interrupt = self.interrupt.clone();
        let input = Arc::clone(&self.input);
        let output = Arc::clone(&self.output);
        let (ready_tx, ready_rx) = mpsc::channel();

        let worker = thread::Builder::new()
            .name("plotscript-kernel".to_owned())
            .stack_size(self.config.stack_size)
            .spawn(move || {
                let interpreter = parked.unwrap_or_else(|| {
                    let mut interpreter = Interpreter::with_interrupt(interrupt);
                    if let Some(program) = startup
                        && let Err(err) = interpreter.run_startup(&program)
                    {
                        log::warn!("startup program failed: {err}");
                        output.push(startup_failure(&err));
                    }
                    interpreter
                });
                if ready_tx.send(()).is_err() {
                    log::warn!("kernel owner went away during startup");
                }
                Consumer::new(interpreter, input, output).run()
            })
            .map_err(|err| Error::KernelError(format!("could not start: {err}")))?;

        if ready_rx.recv().is_err() {
            // The sender only disappears without sending if the worker panicked
            let _ = worker.join();
            return Err(Error::KernelError("worker panicked during startup".to_owned()));
        }

        log::debug!("kernel started");
        self.worker = Some(worker);
        Ok(())
    }

    /// Ask the worker to stop after the pending submissions and wait for it
    pub fn stop(&mut self) -> Result<(), Error> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        self.input.push(ControlToken::Stop.as_str().to_owned());
        match worker.join() {
            Ok(interpreter) => {
                log::debug!("kernel stopped");
                self.parked = Some(interpreter);
                Ok(())
            }
            Err(_) => Err(Error::KernelError("worker panicked".to_owned())),
        }
    }

    /// Stop the worker and start a new one with a fresh interpreter
    pub fn reset(&mut self) -> Result<(), Error> {
        self.stop()?;
        self.parked = None;
        log::debug!("kernel reset");
        self.start()
    }

    /// Queue program text for evaluation
    pub fn submit(&self, program: impl Into<String>) -> Result<(), Error> {
        if !self.is_running() {
            return Err(Error::KernelError("not running".to_owned()));
        }
        self.input.push(program.into());
        Ok(())
    }

    /// Wait for the next result
    pub fn recv(&self) -> Expression {
        self.output.wait_and_pop()
    }

    pub fn try_recv(&self) -> Option<Expression> {
        self.output.try_pop()
    }

    /// Cancel the evaluation in progress; stays raised until [`Kernel::clear_interrupt`]
    pub fn interrupt(&self) {
        log::debug!("kernel interrupt raised");
        self.interrupt.raise();
    }

    pub fn clear_interrupt(&self) {
        self.interrupt.clear();
    }

    /// Handle on the cancellation token, for raising it from a signal handler
    pub fn interrupt_handle(&self) -> Interrupt {
        self.interrupt.clone()
    }

    /// Copy of the worker's interpreter, taken between submissions.
    ///
    /// A running worker is stopped and restarted around the copy, so pending
    /// submissions are evaluated first. `None` if no worker has ever run since the last
    /// reset.
    pub fn snapshot(&mut self) -> Result<Option<Interpreter>, Error> {
        let was_running = self.is_running();
        self.stop()?;
        let snapshot = self.parked.clone();
        if was_running {
            self.start()?;
        }
        Ok(snapshot)
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new(KernelConfig::default())
    }
}

impl Drop for Kernel {
    fn drop(&mut self) {
        if self.is_running() {
            self.interrupt.raise();
            if let Err(err) = self.stop() {
                log::warn!("{err}");
            }
        }
    }
}
