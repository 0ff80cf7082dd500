use eveleve_core::{
    models::Command,
    stream::{EventReceiver, TryRecvError},
};
use eveleve_github::RepoEvent;
use eveleve_travis::BuildEvent;
use tokio_util::sync::CancellationToken;

const SOURCES: usize = 3;

#[derive(Debug)]
pub enum Incoming {
    Command(Command),
    Repo(RepoEvent),
    Build(BuildEvent),
}

/// Multiplexes the command, repository and build streams.
///
/// Items already waiting are taken round-robin starting after the source
/// served last, so a busy stream cannot starve the others. Each stream is
/// read in arrival order.
pub struct EventLoop {
    commands: EventReceiver<Command>,
    repo: EventReceiver<RepoEvent>,
    builds: EventReceiver<BuildEvent>,
    cursor: usize,
    closed: [bool; SOURCES],
}

impl EventLoop {
    pub fn new(
        commands: EventReceiver<Command>,
        repo: EventReceiver<RepoEvent>,
        builds: EventReceiver<BuildEvent>,
    ) -> Self {
        Self { commands, repo, builds, cursor: 0, closed: [false; SOURCES] }
    }

    /// Wait for the next item. Returns `None` once `shutdown` is cancelled or
    /// every stream has closed.
    pub async fn next(&mut self, shutdown: &CancellationToken) -> Option<Incoming> {
        loop {
            if shutdown.is_cancelled() {
                return None;
            }
            for offset in 0..SOURCES {
                let source = (self.cursor + offset) % SOURCES;
                if let Some(item) = self.try_source(source) {
                    self.cursor = (source + 1) % SOURCES;
                    return Some(item);
                }
            }
            if self.closed.iter().all(|closed| *closed) {
                return None;
            }
            let (source, item) = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return None,
                item = self.commands.recv(), if !self.closed[0] => (0, item.map(Incoming::Command)),
                item = self.repo.recv(), if !self.closed[1] => (1, item.map(Incoming::Repo)),
                item = self.builds.recv(), if !self.closed[2] => (2, item.map(Incoming::Build)),
            };
            match item {
                Some(item) => {
                    self.cursor = (source + 1) % SOURCES;
                    return Some(item);
                }
                None => self.closed[source] = true,
            }
        }
    }

    fn try_source(&mut self, source: usize) -> Option<Incoming> {
        if self.closed[source] {
            return None;
        }
        let result = match source {
            0 => self.commands.try_recv().map(Incoming::Command),
            1 => self.repo.try_recv().map(Incoming::Repo),
            _ => self.builds.try_recv().map(Incoming::Build),
        };
        match result {
            Ok(item) => Some(item),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.closed[source] = true;
                None
            }
        }
    }
}
