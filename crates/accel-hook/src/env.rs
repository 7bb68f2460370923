use std::collections::BTreeMap;
use std::sync::Mutex;

/// Process-wide variables the dispatcher reads and the dump controller clears.
pub trait ProcessEnv: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// # Safety
    ///
    /// For the real process environment no other thread may read or write it
    /// during the call. Inside this crate that means holding a
    /// [`DumpPermit`](crate::dump::DumpPermit).
    unsafe fn remove(&self, key: &str);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemEnv;

impl ProcessEnv for SystemEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    unsafe fn remove(&self, key: &str) {
        // SAFETY: upheld by the caller, see the trait method.
        unsafe { std::env::remove_var(key) }
    }
}

/// In-memory environment, for embedding and tests.
#[derive(Debug, Default)]
pub struct MapEnv {
    vars: Mutex<BTreeMap<String, String>>,
}

impl MapEnv {
    pub fn new<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: Mutex::new(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        if let Ok(mut g) = self.vars.lock() {
            g.insert(key.into(), value.into());
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

impl ProcessEnv for MapEnv {
    fn get(&self, key: &str) -> Option<String> {
        self.vars.lock().ok().and_then(|g| g.get(key).cloned())
    }

    unsafe fn remove(&self, key: &str) {
        if let Ok(mut g) = self.vars.lock() {
            g.remove(key);
        }
    }
}
