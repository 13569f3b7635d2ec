use crate::config::RegistryConfig;
use crate::environment::Environment;
use crate::error::{SimError, SimResult};
use crate::simulation::{Simulation, StopHandle};
use crate::util::{lock, read, write};
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

/// A simulation held by a [SimulationRegistry].
pub struct SimulationHandle {
    sim: Mutex<Simulation>,
    stop: StopHandle,
}

impl SimulationHandle {
    fn new(sim: Simulation) -> Self {
        Self {
            stop: sim.stop_handle(),
            sim: Mutex::new(sim),
        }
    }

    /// Locks the simulation for exclusive use.
    pub fn lock(&self) -> MutexGuard<'_, Simulation> {
        lock(&self.sim)
    }

    /// Stops the simulation without waiting for the lock.
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }
}

/// A concurrent map of simulations, keyed by short random strings.
///
/// Each simulation has its own lock, so callers working on different
/// simulations never block one another.
pub struct SimulationRegistry {
    config: RegistryConfig,
    sims: RwLock<HashMap<String, Arc<SimulationHandle>>>,
}

impl Default for SimulationRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl SimulationRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            sims: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a simulation on the given environment, using the registry's
    /// simulation config, and returns its key.
    pub fn create(&self, environment: Environment) -> String {
        let sim = Simulation::with_config(environment, self.config.simulation.clone());
        self.create_with(sim)
    }

    /// Stores an existing simulation under a fresh key and returns the key.
    pub fn create_with(&self, sim: Simulation) -> String {
        let mut rng = rand::thread_rng();
        let mut sims = write(&self.sims);
        let key = loop {
            let key = random_key(&mut rng, self.config.key_length);
            if !sims.contains_key(&key) {
                break key;
            }
        };
        sims.insert(key.clone(), Arc::new(SimulationHandle::new(sim)));
        log::info!("created simulation {:?}", key);
        key
    }

    /// Gets the simulation with the given key.
    pub fn get(&self, key: &str) -> SimResult<Arc<SimulationHandle>> {
        read(&self.sims)
            .get(key)
            .cloned()
            .ok_or_else(|| SimError::SimulationNotFound(key.to_string()))
    }

    /// Replaces the simulation stored under an existing key.
    pub fn replace(&self, key: &str, sim: Simulation) -> SimResult<()> {
        let mut sims = write(&self.sims);
        let slot = sims
            .get_mut(key)
            .ok_or_else(|| SimError::SimulationNotFound(key.to_string()))?;
        *slot = Arc::new(SimulationHandle::new(sim));
        log::debug!("replaced simulation {:?}", key);
        Ok(())
    }

    /// Removes a simulation from the registry and stops it.
    pub fn delete(&self, key: &str) -> SimResult<()> {
        let handle = write(&self.sims)
            .remove(key)
            .ok_or_else(|| SimError::SimulationNotFound(key.to_string()))?;
        handle.stop();
        log::info!("deleted simulation {:?}", key);
        Ok(())
    }

    /// Runs a closure on the simulation with the given key while holding its lock.
    pub fn with<T>(&self, key: &str, f: impl FnOnce(&mut Simulation) -> T) -> SimResult<T> {
        let handle = self.get(key)?;
        let mut sim = handle.lock();
        Ok(f(&mut sim))
    }

    /// Stops the simulation with the given key. Does not wait for the
    /// simulation's lock, so it reaches a simulation that is mid-run.
    pub fn stop(&self, key: &str) -> SimResult<()> {
        self.get(key)?.stop();
        log::info!("stopped simulation {:?}", key);
        Ok(())
    }

    /// The keys of every simulation, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys = read(&self.sims).keys().cloned().collect::<Vec<_>>();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        read(&self.sims).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Generates a key of `len` random lowercase letters; at least one letter.
fn random_key(rng: &mut impl Rng, len: usize) -> String {
    (0..len.max(1))
        .map(|_| char::from(rng.gen_range(b'a'..=b'z')))
        .collect()
}
