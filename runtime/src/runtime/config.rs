//! Run options for the VM front end.

/// What the runtime does around an execution: tracing, counters and
/// post-run dumps.
#[derive(Clone, Debug, Default)]
pub struct RunConfig {
    pub debug: bool,
    pub stats: bool,
    pub dump_stack: bool,
    pub dump_memory: bool,
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_stats(mut self, stats: bool) -> Self {
        self.stats = stats;
        self
    }

    pub fn with_dump_stack(mut self, dump_stack: bool) -> Self {
        self.dump_stack = dump_stack;
        self
    }

    pub fn with_dump_memory(mut self, dump_memory: bool) -> Self {
        self.dump_memory = dump_memory;
        self
    }
}
