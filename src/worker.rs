//! Line-oriented worker protocol hosting one simulation.
//!
//! The first input line is a JSON object with the device description, any
//! parameter keys, and optionally `seed`, `randomize` and `flip` (or
//! `flippingAlgorithm`). The worker answers `READY` and then serves commands,
//! one per line; commands taking an argument read it as JSON from the
//! following line.
//!
//! - `RUN` `{"iterations", "freq", "dkT", "dB"}`: prints the state before the
//!   run and after every `freq` iterations, reading `CONTINUE` or `CANCEL`
//!   after each, then `DONE`.
//! - `GET` `["results", "parameters", "seed", "msd", "mol"]`: prints the
//!   selected parts of the state (all of them for an empty list).
//! - `SET` `{partial parameter keys}`: updates parameters and the flip
//!   strategy, prints `DONE`.
//! - `RESET` `{"seed", "reseed", "randomize"}`: prints the seed.
//! - `EXIT`: prints `GOODBYE` and stops.

use std::collections::HashSet;
use std::io::{BufRead, Write};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use msd_sim::molecule::{EdgeParameters, NodeParameters};
use msd_sim::{DVec3, Device, DeviceConfig, FlipStrategy, Parameters, Simulation};

const FLIP_KEYS: [&str; 2] = ["flip", "flippingAlgorithm"];
const PARTS: [&str; 5] = ["results", "parameters", "seed", "msd", "mol"];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Setup {
    seed: Option<u64>,
    randomize: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RunRequest {
    #[serde(alias = "simCount")]
    iterations: u64,
    freq: u64,
    #[serde(rename = "dkT")]
    dkt: f64,
    #[serde(rename = "dB")]
    db: DVec3,
}

impl Default for RunRequest {
    fn default() -> Self {
        Self {
            iterations: 0,
            freq: 0,
            dkt: 0.0,
            db: DVec3::ZERO,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ResetRequest {
    seed: Option<u64>,
    reseed: bool,
    randomize: bool,
}

impl Default for ResetRequest {
    fn default() -> Self {
        Self {
            seed: None,
            reseed: true,
            randomize: false,
        }
    }
}

struct Worker<R, W> {
    input: R,
    output: W,
    sim: Simulation,
}

/// Serve the protocol until `EXIT` or end of input.
pub fn serve<R: BufRead, W: Write>(mut input: R, output: W) -> Result<()> {
    let Some(line) = read_line(&mut input)? else {
        return Ok(());
    };
    let init: Value = serde_json::from_str(&line).context("parsing the setup line")?;
    let device_cfg = DeviceConfig::deserialize(&init).context("reading the device description")?;
    let setup = Setup::deserialize(&init).context("reading the setup options")?;

    let device = Device::new(&device_cfg, Parameters::default());
    let sim = match setup.seed {
        Some(seed) => Simulation::with_seed(device, seed),
        None => Simulation::new(device),
    };
    let mut worker = Worker { input, output, sim };
    worker.set(&init)?;
    if setup.randomize {
        worker.sim.randomize(false);
    }

    worker.say("READY")?;
    worker.serve()
}

fn read_line<R: BufRead>(input: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_owned()))
}

impl<R: BufRead, W: Write> Worker<R, W> {
    fn serve(&mut self) -> Result<()> {
        while let Some(cmd) = read_line(&mut self.input)? {
            match cmd.to_uppercase().as_str() {
                "EXIT" => {
                    self.say("GOODBYE")?;
                    return Ok(());
                }
                "SET" => {
                    let kw = self.read_json()?;
                    self.set(&kw)?;
                    self.say("DONE")?;
                }
                "RUN" => {
                    let req: RunRequest = serde_json::from_value(self.read_json()?)?;
                    self.run(&req)?;
                }
                "GET" => {
                    let parts: Vec<String> = serde_json::from_value(self.read_json()?)?;
                    let parts: HashSet<&str> = parts.iter().map(String::as_str).collect();
                    if let Some(unknown) = parts.iter().find(|p| !PARTS.contains(*p)) {
                        warn!(part = %unknown, "unknown state part requested");
                    }
                    let state = self.state(&parts);
                    self.say(&state.to_string())?;
                }
                "RESET" => {
                    let req: ResetRequest = serde_json::from_value(self.read_json()?)?;
                    self.reset(&req);
                    let state = self.state(&HashSet::from(["seed"]));
                    self.say(&state.to_string())?;
                }
                "" => {}
                other => warn!(command = other, "unrecognized command"),
            }
        }
        Ok(())
    }

    fn say(&mut self, line: &str) -> Result<()> {
        writeln!(self.output, "{line}")?;
        self.output.flush()?;
        Ok(())
    }

    fn read_json(&mut self) -> Result<Value> {
        match read_line(&mut self.input)? {
            Some(line) => Ok(serde_json::from_str(&line)?),
            None => bail!("input closed while waiting for a JSON argument"),
        }
    }

    /// `false` once the driver answered `CANCEL`.
    fn proceed(&mut self) -> Result<bool> {
        Ok(read_line(&mut self.input)?.is_some_and(|l| !l.eq_ignore_ascii_case("CANCEL")))
    }

    fn run(&mut self, req: &RunRequest) -> Result<()> {
        let freq = if req.freq == 0 { req.iterations } else { req.freq };
        let mut remaining = req.iterations;
        debug!(iterations = remaining, freq, "run requested");

        let state = self.state(&HashSet::new());
        self.say(&state.to_string())?;
        let mut go = self.proceed()?;
        while go && freq > 0 && remaining >= freq {
            self.advance(freq, req);
            remaining -= freq;
            let state = self.state(&HashSet::new());
            self.say(&state.to_string())?;
            go = self.proceed()?;
        }
        if go && remaining > 0 {
            self.advance(remaining, req);
            let state = self.state(&HashSet::new());
            self.say(&state.to_string())?;
            self.proceed()?;
        }
        self.say("DONE")
    }

    /// `n` steps, ramping kT and B after every step when a rate is given.
    fn advance(&mut self, n: u64, req: &RunRequest) {
        if req.dkt == 0.0 && req.db == DVec3::ZERO {
            self.sim.metropolis(n);
            return;
        }
        for _ in 0..n {
            self.sim.metropolis(1);
            let p = *self.sim.device().parameters();
            let device = self.sim.device_mut();
            device.set_kt(p.kt + req.dkt);
            device.set_field(p.field + req.db);
        }
    }

    fn reset(&mut self, req: &ResetRequest) {
        let reseed = match req.seed {
            Some(seed) => {
                self.sim.set_seed(seed);
                false
            }
            None => req.reseed,
        };
        if req.randomize {
            self.sim.randomize(reseed);
        } else {
            self.sim.reinitialize(reseed);
        }
    }

    /// Apply the parameter keys present in `kw`, leaving the rest unchanged.
    fn set(&mut self, kw: &Value) -> Result<()> {
        let Some(kw) = kw.as_object() else {
            bail!("SET expects a JSON object");
        };
        for key in FLIP_KEYS {
            if let Some(flip) = kw.get(key) {
                self.sim.set_flip(FlipStrategy::deserialize(flip)?);
            }
        }
        let device = self.sim.device_mut();

        if kw.keys().all(|k| k == "kT" || k == "B") {
            if let Some(kt) = kw.get("kT") {
                device.set_kt(serde_json::from_value(kt.clone())?);
            }
            if let Some(b) = kw.get("B") {
                device.set_field(serde_json::from_value(b.clone())?);
            }
            return Ok(());
        }

        if let Some(p) = merge(device.parameters(), kw)? {
            device.set_parameters(p);
        }

        let mut proto = device.mol_proto().clone();
        let mut touched = false;
        for i in 0..proto.node_count() {
            if let Some(np) = merge::<NodeParameters>(proto.node_parameters(i)?, kw)? {
                proto.set_node_parameters(i, np)?;
                touched = true;
            }
        }
        for i in 0..proto.edge_count() {
            if let Some(ep) = merge::<EdgeParameters>(proto.edge_parameters(i)?, kw)? {
                proto.set_edge_parameters(i, ep)?;
                touched = true;
            }
        }
        if touched {
            device.set_mol_proto(proto)?;
        }
        Ok(())
    }

    fn state(&self, parts: &HashSet<&str>) -> Value {
        let want = |p: &str| parts.is_empty() || parts.contains(p);
        let device = self.sim.device();
        let mut state = Map::new();
        if want("results") {
            state.insert("results".into(), json!(device.results()));
        }
        if want("parameters") {
            state.insert("parameters".into(), json!(device.parameters()));
        }
        if want("seed") {
            state.insert("seed".into(), json!(self.sim.seed()));
        }
        if want("msd") {
            let sites: Vec<Value> = device
                .sites()
                .map(|s| {
                    json!({
                        "pos": [s.x, s.y, s.z],
                        "spin": s.spin,
                        "flux": s.flux,
                        "localM": s.spin + s.flux,
                    })
                })
                .collect();
            state.insert("msd".into(), Value::Array(sites));
        }
        if want("mol") {
            let proto = device.mol_proto();
            let nodes: Vec<Value> = proto
                .nodes()
                .enumerate()
                .map(|(index, p)| json!({ "index": index, "parameters": p }))
                .collect();
            state.insert(
                "mol".into(),
                json!({
                    "nodes": nodes,
                    "edges": proto.edges(),
                    "leftLead": proto.left_lead(),
                    "rightLead": proto.right_lead(),
                }),
            );
        }
        Value::Object(state)
    }
}

/// Overlay the keys of `kw` that belong to `T` onto `current`. `None` when
/// no key of `T` is present.
fn merge<T>(current: &T, kw: &Map<String, Value>) -> Result<Option<T>>
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    let Value::Object(mut fields) = serde_json::to_value(current)? else {
        bail!("parameter record did not serialize to an object");
    };
    let mut changed = false;
    for (k, v) in kw {
        if let Some(slot) = fields.get_mut(k) {
            *slot = v.clone();
            changed = true;
        }
    }
    if !changed {
        return Ok(None);
    }
    Ok(Some(serde_json::from_value(Value::Object(fields))?))
}
