use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Atomic masses in g/mol.
pub const OXYGEN_MASS: f64 = 15.9994;
pub const HYDROGEN_MASS: f64 = 1.00794;
/// Not used by the default water layout. Heavy-water systems must opt in by
/// configuring it as the hydrogen-site mass.
pub const DEUTERIUM_MASS: f64 = 2.0141;

/// Point charges (e) of the default water model.
pub const OXYGEN_CHARGE: f64 = -1.0;
pub const HYDROGEN_CHARGE: f64 = 0.5;

#[derive(Debug, Error, PartialEq)]
pub enum LayoutError {
    #[error("A molecule needs at least two sites, found {0}")]
    TooFewSites(usize),
    #[error("Site {index} has a non-positive mass ({mass})")]
    InvalidMass { index: usize, mass: f64 },
    #[error("Site {index} has an empty species label")]
    EmptySpecies { index: usize },
    #[error("Molecule count must be positive")]
    ZeroMolecules,
    #[error(
        "{molecules} molecules of {sites} sites need {required} atoms, but the trajectory has {atoms}"
    )]
    NotEnoughAtoms {
        molecules: usize,
        sites: usize,
        required: usize,
        atoms: usize,
    },
    #[error("Atom {atom} is labelled '{found}', expected species '{expected}'")]
    LabelMismatch {
        atom: usize,
        expected: String,
        found: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub species: String,
    pub mass: f64,
    pub charge: f64,
}

impl Site {
    pub fn new(species: &str, mass: f64, charge: f64) -> Self {
        Self {
            species: species.to_string(),
            mass,
            charge,
        }
    }

    /// Whether a trajectory label names this site's species (`OW` matches `O`).
    pub fn matches_label(&self, label: &str) -> bool {
        label
            .to_ascii_lowercase()
            .starts_with(&self.species.to_ascii_lowercase())
    }
}

/// Fixed-stride grouping of atoms into molecules.
///
/// Atom `m * sites + k` is site `k` of molecule `m`. Site 0 is the central
/// atom and site 1 the partner used for bond vectors and bond lengths.
#[derive(Debug, Clone, PartialEq)]
pub struct MoleculeLayout {
    sites: Vec<Site>,
    molecule_count: Option<usize>,
}

impl MoleculeLayout {
    pub fn new(sites: Vec<Site>, molecule_count: Option<usize>) -> Result<Self, LayoutError> {
        if sites.len() < 2 {
            return Err(LayoutError::TooFewSites(sites.len()));
        }
        for (index, site) in sites.iter().enumerate() {
            if site.species.trim().is_empty() {
                return Err(LayoutError::EmptySpecies { index });
            }
            if !(site.mass > 0.0) {
                return Err(LayoutError::InvalidMass {
                    index,
                    mass: site.mass,
                });
            }
        }
        if molecule_count == Some(0) {
            return Err(LayoutError::ZeroMolecules);
        }
        Ok(Self {
            sites,
            molecule_count,
        })
    }

    /// Oxygen followed by two hydrogens.
    pub fn water(molecule_count: Option<usize>) -> Self {
        Self {
            sites: vec![
                Site::new("O", OXYGEN_MASS, OXYGEN_CHARGE),
                Site::new("H", HYDROGEN_MASS, HYDROGEN_CHARGE),
                Site::new("H", HYDROGEN_MASS, HYDROGEN_CHARGE),
            ],
            molecule_count,
        }
    }

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    #[inline]
    pub fn sites_per_molecule(&self) -> usize {
        self.sites.len()
    }

    pub fn configured_molecule_count(&self) -> Option<usize> {
        self.molecule_count
    }

    pub fn total_mass(&self) -> f64 {
        self.sites.iter().map(|s| s.mass).sum()
    }

    #[inline]
    pub fn atom_index(&self, molecule: usize, site: usize) -> usize {
        molecule * self.sites.len() + site
    }

    /// Resolves the number of molecules for a trajectory with `atoms` atoms.
    ///
    /// Without a configured count, every complete group of sites is a molecule.
    pub fn molecule_count(&self, atoms: usize) -> Result<usize, LayoutError> {
        let sites = self.sites.len();
        let molecules = self.molecule_count.unwrap_or(atoms / sites);
        if molecules == 0 {
            return Err(LayoutError::ZeroMolecules);
        }
        let required = molecules * sites;
        if required > atoms {
            return Err(LayoutError::NotEnoughAtoms {
                molecules,
                sites,
                required,
                atoms,
            });
        }
        Ok(molecules)
    }

    /// Checks that the first `molecules` groups of `labels` follow the site order.
    pub fn validate_labels(&self, labels: &[String], molecules: usize) -> Result<(), LayoutError> {
        for molecule in 0..molecules {
            for (k, site) in self.sites.iter().enumerate() {
                let atom = self.atom_index(molecule, k);
                let found = labels.get(atom).map(String::as_str).unwrap_or("");
                if !site.matches_label(found) {
                    return Err(LayoutError::LabelMismatch {
                        atom,
                        expected: site.species.clone(),
                        found: found.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl Default for MoleculeLayout {
    fn default() -> Self {
        Self::water(None)
    }
}
