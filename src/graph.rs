//! Application communication graph.
//!
//! A [`CommGraph`] holds applications, each owning an ordered list of
//! threads (computation units). Threads own directed, weighted edges
//! ([`Target`]s) to other threads. The graph is built once and then only
//! read by the composition engine.
//!
//! Threads refer to each other through [`ThreadRef`], an `(app, thread)`
//! index pair, so edges may cross application boundaries and form cycles.
//!
//! # Example
//!
//! ```
//! use nocflow::graph::CommGraph;
//!
//! let mut graph = CommGraph::new();
//! let app = graph.add_application("PIP");
//! let src = graph.add_thread(app, Some("InpMemA")).unwrap();
//! let dst = graph.add_thread(app, Some("HS")).unwrap();
//! graph.add_target(src, dst, 128.0).unwrap();
//!
//! assert_eq!(graph.thread(src).unwrap().total_bandwidth(), 128.0);
//! ```

use crate::error::{FlowError, FlowResult};
use crate::types::{AppId, Mbps, ThreadId};

/// Non-owning reference to a thread: its application id and its id within
/// that application.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadRef {
    pub app: AppId,
    pub thread: ThreadId,
}

impl ThreadRef {
    pub fn new(app: AppId, thread: ThreadId) -> Self {
        Self { app, thread }
    }
}

impl std::fmt::Display for ThreadRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.app, self.thread)
    }
}

/// A directed edge to another thread, weighted by bandwidth.
#[derive(Clone, Debug, PartialEq)]
pub struct Target {
    /// Destination thread
    pub dst: ThreadRef,
    /// Requested bandwidth in Mbps (finite, `>= 0`)
    pub bandwidth: Mbps,
}

impl Target {
    /// Creates a target, rejecting negative or non-finite bandwidth.
    pub fn new(dst: ThreadRef, bandwidth: Mbps) -> FlowResult<Self> {
        if !bandwidth.is_finite() || bandwidth < 0.0 {
            return Err(FlowError::InvalidBandwidth { value: bandwidth });
        }
        Ok(Self { dst, bandwidth })
    }
}

/// A computation unit.
#[derive(Clone, Debug)]
pub struct Thread {
    id: ThreadId,
    app: AppId,
    name: Option<String>,
    targets: Vec<Target>,
    total_bandwidth: Mbps,
}

impl Thread {
    fn new(app: AppId, id: ThreadId, name: Option<String>) -> Self {
        Self {
            id,
            app,
            name,
            targets: Vec::new(),
            total_bandwidth: 0.0,
        }
    }

    /// Appends an outgoing edge and adds its bandwidth to the running total.
    pub fn add_target(&mut self, target: Target) {
        self.total_bandwidth += target.bandwidth;
        self.targets.push(target);
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    /// Reference to this thread.
    pub fn thread_ref(&self) -> ThreadRef {
        ThreadRef::new(self.app, self.id)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Sum of the bandwidth of all targets, maintained incrementally.
    pub fn total_bandwidth(&self) -> Mbps {
        self.total_bandwidth
    }
}

/// An application: a named, ordered collection of threads.
#[derive(Clone, Debug)]
pub struct Application {
    id: AppId,
    name: String,
    threads: Vec<Thread>,
}

impl Application {
    pub fn id(&self) -> AppId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn threads(&self) -> &[Thread] {
        &self.threads
    }

    /// Finds a thread by name.
    pub fn find_thread(&self, name: &str) -> Option<&Thread> {
        self.threads.iter().find(|t| t.name() == Some(name))
    }
}

/// The communication graph of every application mapped onto a platform.
#[derive(Clone, Debug, Default)]
pub struct CommGraph {
    applications: Vec<Application>,
}

impl CommGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new application and returns its sequential id.
    pub fn add_application(&mut self, name: impl Into<String>) -> AppId {
        let id = self.applications.len() as AppId;
        self.applications.push(Application {
            id,
            name: name.into(),
            threads: Vec::new(),
        });
        id
    }

    /// Inserts a thread into `app`; its id is the insertion index.
    pub fn add_thread(&mut self, app: AppId, name: Option<&str>) -> FlowResult<ThreadRef> {
        let application = self
            .applications
            .get_mut(app as usize)
            .ok_or(FlowError::UnknownThread { app, thread: 0 })?;
        let id = application.threads.len() as ThreadId;
        application
            .threads
            .push(Thread::new(app, id, name.map(str::to_string)));
        Ok(ThreadRef::new(app, id))
    }

    /// Adds an edge from `src` to `dst`. Both threads must already exist.
    pub fn add_target(&mut self, src: ThreadRef, dst: ThreadRef, bandwidth: Mbps) -> FlowResult<()> {
        if self.thread(dst).is_none() {
            return Err(FlowError::UnknownThread {
                app: dst.app,
                thread: dst.thread,
            });
        }
        let target = Target::new(dst, bandwidth)?;
        let thread = self.thread_mut(src).ok_or(FlowError::UnknownThread {
            app: src.app,
            thread: src.thread,
        })?;
        thread.add_target(target);
        Ok(())
    }

    /// Looks up a thread.
    pub fn thread(&self, r: ThreadRef) -> Option<&Thread> {
        self.applications
            .get(r.app as usize)
            .and_then(|a| a.threads.get(r.thread as usize))
    }

    fn thread_mut(&mut self, r: ThreadRef) -> Option<&mut Thread> {
        self.applications
            .get_mut(r.app as usize)
            .and_then(|a| a.threads.get_mut(r.thread as usize))
    }

    pub fn application(&self, id: AppId) -> Option<&Application> {
        self.applications.get(id as usize)
    }

    pub fn applications(&self) -> &[Application] {
        &self.applications
    }

    /// Finds an application by name.
    pub fn find_application(&self, name: &str) -> Option<&Application> {
        self.applications.iter().find(|a| a.name == name)
    }

    /// Resolves `(application name, thread name)` to a reference.
    pub fn find_thread(&self, app: &str, thread: &str) -> Option<ThreadRef> {
        self.find_application(app)
            .and_then(|a| a.find_thread(thread))
            .map(Thread::thread_ref)
    }

    /// Iterates over all threads in application, then insertion, order.
    pub fn threads(&self) -> impl Iterator<Item = &Thread> {
        self.applications.iter().flat_map(|a| a.threads.iter())
    }

    pub fn application_count(&self) -> usize {
        self.applications.len()
    }

    pub fn thread_count(&self) -> usize {
        self.applications.iter().map(|a| a.threads.len()).sum()
    }

    pub fn target_count(&self) -> usize {
        self.threads().map(|t| t.targets.len()).sum()
    }
}
