use std::collections::{HashMap, HashSet};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::ChannelConfig;
use crate::entry::ChannelEntry;
use crate::error::Result;
use crate::reader::ReadHandle;

#[derive(Default)]
struct Entries {
    bound: HashMap<String, ChannelEntry>,
    /// Addresses whose listener and threads are being started outside the lock.
    binding: HashSet<String>,
}

/// Maps address strings to bound channels.
///
/// Binding the same address twice joins the existing channel. Addresses
/// are keyed by the exact string given to [`bind`](Self::bind), so
/// `":9000"` and `"0.0.0.0:9000"` are different entries (and the second
/// fails to listen while the first is bound).
///
/// Binds of different addresses run concurrently; a bind of an address
/// that is still starting up waits for it and then joins it.
///
/// Dropping the registry unbinds every remaining address.
pub struct Registry {
    entries: Mutex<Entries>,
    binding_done: Condvar,
    config: ChannelConfig,
}

impl Registry {
    /// Create an empty registry using the default channel configuration.
    pub fn new() -> Self {
        Self::with_config(ChannelConfig::default())
    }

    /// Create an empty registry whose binds use `config` by default.
    pub fn with_config(config: ChannelConfig) -> Self {
        Self {
            entries: Mutex::new(Entries::default()),
            binding_done: Condvar::new(),
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bind `address` and return a handle receiving the values written to it.
    ///
    /// If `address` is already bound, returns another handle on the same
    /// channel without touching the network.
    pub fn bind<T>(&self, address: &str) -> Result<ReadHandle<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.bind_with_config(address, self.config.clone())
    }

    /// Like [`bind`](Self::bind) with an explicit configuration.
    ///
    /// The configuration only applies when this call creates the channel.
    pub fn bind_with_config<T>(&self, address: &str, config: ChannelConfig) -> Result<ReadHandle<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        {
            let mut entries = self.lock();
            loop {
                if let Some(entry) = entries.bound.get(address) {
                    debug!(%address, "joining bound channel");
                    return entry.reader::<T>();
                }
                if !entries.binding.contains(address) {
                    break;
                }
                entries = self
                    .binding_done
                    .wait(entries)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            entries.binding.insert(address.to_string());
        }

        let opened = ChannelEntry::open::<T>(address, &config)
            .and_then(|entry| entry.reader::<T>().map(|reader| (entry, reader)));

        let mut entries = self.lock();
        entries.binding.remove(address);
        let result = opened.map(|(entry, reader)| {
            entries.bound.insert(address.to_string(), entry);
            reader
        });
        drop(entries);
        self.binding_done.notify_all();
        result
    }

    /// Tear down the channel bound at `address`. No-op if nothing is bound.
    ///
    /// Every handle on the channel reports it closed, live connections are
    /// shut down and the address is free to bind again once this returns.
    pub fn unbind(&self, address: &str) {
        let entry = self.lock().bound.remove(address);
        if let Some(mut entry) = entry {
            entry.teardown();
        }
    }

    pub fn contains(&self, address: &str) -> bool {
        self.lock().bound.contains_key(address)
    }

    /// Bound addresses, sorted.
    pub fn addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self.lock().bound.keys().cloned().collect();
        addresses.sort();
        addresses
    }

    /// Whether the channel at `address` still accepts new connections.
    ///
    /// `None` if nothing is bound there. A channel whose listener failed
    /// stays bound, serving its existing connections, until unbound.
    pub fn is_accepting(&self, address: &str) -> Option<bool> {
        self.lock().bound.get(address).map(ChannelEntry::is_accepting)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        let entries: Vec<ChannelEntry> = self.lock().bound.drain().map(|(_, entry)| entry).collect();
        for mut entry in entries {
            entry.teardown();
        }
    }
}
