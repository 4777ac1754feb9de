//! Save-file storage
//!
//! The ledger lives in a `SCENARIO` node (tagged `name = CareerLedger`)
//! inside a text save file. Other scenario nodes in the same file are
//! left untouched on save.
//!
//! Writes go to a sibling temp file that is then renamed over the save, so
//! a crash mid-write never leaves a truncated file behind.

use crate::{
    error::Result,
    host::CurrencyHost,
    ledger::Ledger,
    node::ConfigNode,
    Config,
};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Node holding one scenario module's state
pub const SCENARIO_NODE: &str = "SCENARIO";

/// Value of the `name` key identifying the ledger's scenario node
pub const SCENARIO_NAME: &str = "CareerLedger";

const NAME_KEY: &str = "name";

/// Text save file on disk
#[derive(Debug, Clone)]
pub struct SaveStore {
    path: PathBuf,
}

impl SaveStore {
    /// Open the save store, creating the data directory if needed
    pub fn open(config: &Config) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        Ok(Self {
            path: config.data_dir.join(&config.save_file),
        })
    }

    /// Save file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the whole save file; `None` if it does not exist yet
    pub fn read_root(&self) -> Result<Option<ConfigNode>> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(Some(ConfigNode::parse(&text)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the save file with `root`
    pub fn write_root(&self, root: &ConfigNode) -> Result<()> {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, root.to_text())?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// The ledger's scenario node, if the save has one
    pub fn load_scenario(&self) -> Result<Option<ConfigNode>> {
        Ok(self
            .read_root()?
            .and_then(|root| root.get_nodes(SCENARIO_NODE).find(|n| is_ledger_scenario(n)).cloned()))
    }

    /// Restore `ledger` from the save
    ///
    /// Returns `false` (leaving the ledger untouched) when there is no save
    /// or it carries no ledger scenario.
    pub fn load_into<H>(&self, ledger: &mut Ledger, host: &H) -> Result<bool>
    where
        H: CurrencyHost + ?Sized,
    {
        match self.load_scenario()? {
            Some(scenario) => {
                ledger.restore(&scenario, host);
                Ok(true)
            }
            None => {
                tracing::info!(path = %self.path.display(), "No ledger save found; starting fresh");
                Ok(false)
            }
        }
    }

    /// Persist `ledger` into the save, keeping every other node as it was
    pub fn save_from(&self, ledger: &mut Ledger) -> Result<()> {
        let mut root = self.read_root()?.unwrap_or_default();

        let existing = root
            .nodes()
            .iter()
            .position(|n| n.name() == SCENARIO_NODE && is_ledger_scenario(n));

        match existing {
            Some(index) => ledger.persist(&mut root.nodes_mut()[index]),
            None => {
                let mut scenario = ConfigNode::new(SCENARIO_NODE);
                scenario.add_value(NAME_KEY, SCENARIO_NAME);
                ledger.persist(&mut scenario);
                root.add_node(scenario);
            }
        }

        self.write_root(&root)?;
        tracing::debug!(path = %self.path.display(), "Wrote save file");
        Ok(())
    }
}

fn is_ledger_scenario(node: &ConfigNode) -> bool {
    node.get_value(NAME_KEY) == Some(SCENARIO_NAME)
}
