//! Name-based material classification.
//!
//! Meshes are matched against an ordered table of substring rules on their
//! material name (case-insensitive). The first matching rule's profile replaces
//! the authored shading; meshes without a match follow the configured
//! [`UnmatchedMaterialPolicy`]. The uniform-everything policy bypasses the
//! table entirely.

use super::{MaterialDescriptor, ModelAsset};
use serde::{Deserialize, Serialize};

/// Pure shading data applied to a mesh material.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadingProfile {
    /// Linear RGB.
    pub color: [f32; 3],
    /// Linear RGB.
    pub emissive: [f32; 3],
    pub metalness: f32,
    pub roughness: f32,
    pub reflectivity: f32,
    pub env_intensity: f32,
}

impl Default for ShadingProfile {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0],
            emissive: [0.0, 0.0, 0.0],
            metalness: 0.0,
            roughness: 1.0,
            reflectivity: 0.5,
            env_intensity: 1.0,
        }
    }
}

impl ShadingProfile {
    /// Uniform finish the static display gives every mesh.
    pub fn polished_silver() -> Self {
        Self {
            color: srgb_hex(0xc0c0c0),
            emissive: [0.0, 0.0, 0.0],
            metalness: 1.0,
            roughness: 0.05,
            reflectivity: 1.0,
            env_intensity: 1.5,
        }
    }

    fn metal(hex: u32, roughness: f32) -> Self {
        Self {
            color: srgb_hex(hex),
            emissive: [0.0, 0.0, 0.0],
            metalness: 1.0,
            roughness,
            reflectivity: 1.0,
            env_intensity: 1.5,
        }
    }

    fn gem(hex: u32, glow: u32) -> Self {
        Self {
            color: srgb_hex(hex),
            emissive: srgb_hex(glow),
            metalness: 0.1,
            roughness: 0.05,
            reflectivity: 0.9,
            env_intensity: 2.0,
        }
    }

    pub fn apply_to(&self, material: &mut MaterialDescriptor) {
        material.base_color = [self.color[0], self.color[1], self.color[2], 1.0];
        material.emissive = self.emissive;
        material.metalness = self.metalness.clamp(0.0, 1.0);
        material.roughness = self.roughness.clamp(0.0, 1.0);
        material.reflectivity = self.reflectivity.clamp(0.0, 1.0);
        material.env_intensity = self.env_intensity.max(0.0);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialRule {
    pub pattern: String,
    pub profile: ShadingProfile,
}

impl MaterialRule {
    pub fn new(pattern: &str, profile: ShadingProfile) -> Self {
        Self {
            pattern: pattern.to_ascii_lowercase(),
            profile,
        }
    }

    /// First match wins, so "Gold_Silver" resolves to silver and "RoseGold" to
    /// rose purely by table position.
    pub fn default_table() -> Vec<Self> {
        vec![
            Self::new("silver", ShadingProfile::metal(0xc0c0c0, 0.2)),
            Self::new("rose", ShadingProfile::metal(0xe8b4a0, 0.25)),
            Self::new("gold", ShadingProfile::metal(0xf5c16c, 0.25)),
            Self::new("platinum", ShadingProfile::metal(0xe5e4e2, 0.15)),
            Self::new(
                "diamond",
                ShadingProfile {
                    color: [1.0, 1.0, 1.0],
                    emissive: srgb_hex(0x101010),
                    metalness: 0.0,
                    roughness: 0.0,
                    reflectivity: 1.0,
                    env_intensity: 2.0,
                },
            ),
            Self::new("gem", ShadingProfile::gem(0xb9f2ff, 0x0b1e26)),
            Self::new("ruby", ShadingProfile::gem(0xe0115f, 0x3a0010)),
            Self::new("emerald", ShadingProfile::gem(0x50c878, 0x06301a)),
            Self::new("sapphire", ShadingProfile::gem(0x0f52ba, 0x04163a)),
            Self::new(
                "crystal",
                ShadingProfile {
                    color: srgb_hex(0xf0f8ff),
                    emissive: srgb_hex(0x0a0a0a),
                    metalness: 0.0,
                    roughness: 0.02,
                    reflectivity: 1.0,
                    env_intensity: 2.0,
                },
            ),
            Self::new(
                "pearl",
                ShadingProfile {
                    color: srgb_hex(0xf8f6f0),
                    emissive: [0.0, 0.0, 0.0],
                    metalness: 0.0,
                    roughness: 0.35,
                    reflectivity: 0.5,
                    env_intensity: 1.0,
                },
            ),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedMaterialPolicy {
    KeepAuthored,
    Uniform(ShadingProfile),
    /// Skips the rule table and applies the profile to every mesh.
    UniformAll(ShadingProfile),
}

/// Outcome for one mesh.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Rule { pattern: String },
    Uniform,
    Authored,
}

#[derive(Debug, Default)]
pub struct ClassificationReport {
    pub meshes: Vec<(String, Classification)>,
}

impl ClassificationReport {
    pub fn rule_hits(&self) -> usize {
        self.meshes
            .iter()
            .filter(|(_, c)| matches!(c, Classification::Rule { .. }))
            .count()
    }
}

pub struct MaterialClassifier {
    rules: Vec<MaterialRule>,
    unmatched: UnmatchedMaterialPolicy,
}

impl MaterialClassifier {
    pub fn new(rules: Vec<MaterialRule>, unmatched: UnmatchedMaterialPolicy) -> Self {
        let rules = rules
            .into_iter()
            .filter(|rule| !rule.pattern.is_empty())
            .map(|rule| MaterialRule::new(&rule.pattern, rule.profile))
            .collect();
        Self { rules, unmatched }
    }

    /// First rule whose pattern occurs in `material_name`.
    pub fn lookup(&self, material_name: &str) -> Option<&MaterialRule> {
        let name = material_name.to_ascii_lowercase();
        self.rules.iter().find(|rule| name.contains(&rule.pattern))
    }

    pub fn classify(&self, material: &mut MaterialDescriptor) -> Classification {
        if let UnmatchedMaterialPolicy::UniformAll(profile) = &self.unmatched {
            profile.apply_to(material);
            return Classification::Uniform;
        }
        if let Some(rule) = self.lookup(&material.name) {
            rule.profile.apply_to(material);
            return Classification::Rule {
                pattern: rule.pattern.clone(),
            };
        }
        match &self.unmatched {
            UnmatchedMaterialPolicy::KeepAuthored => Classification::Authored,
            UnmatchedMaterialPolicy::Uniform(profile)
            | UnmatchedMaterialPolicy::UniformAll(profile) => {
                profile.apply_to(material);
                Classification::Uniform
            }
        }
    }

    /// Classifies every mesh of a freshly loaded asset. A second call on the
    /// same asset is a no-op.
    pub fn apply(&self, asset: &mut ModelAsset) -> ClassificationReport {
        let mut report = ClassificationReport::default();
        if asset.classified {
            log::warn!("materials of '{}' already classified; skipping", asset.name);
            return report;
        }
        for mesh in &mut asset.meshes {
            let outcome = self.classify(&mut mesh.material);
            log::debug!(
                "mesh '{}' material '{}' -> {:?}",
                mesh.name,
                mesh.material.name,
                outcome
            );
            report.meshes.push((mesh.name.clone(), outcome));
        }
        asset.classified = true;
        report
    }
}

/// sRGB hex colour to linear RGB.
pub fn srgb_hex(hex: u32) -> [f32; 3] {
    let channel = |shift: u32| {
        let c = ((hex >> shift) & 0xff) as f32 / 255.0;
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    [channel(16), channel(8), channel(0)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::tests::unit_cube_asset;

    fn classifier(unmatched: UnmatchedMaterialPolicy) -> MaterialClassifier {
        MaterialClassifier::new(MaterialRule::default_table(), unmatched)
    }

    #[test]
    fn compound_name_hits_silver_rule() {
        let classifier = classifier(UnmatchedMaterialPolicy::KeepAuthored);
        let mut material = MaterialDescriptor::named("Gold_Silver_01");
        let outcome = classifier.classify(&mut material);
        assert_eq!(
            outcome,
            Classification::Rule {
                pattern: "silver".to_string()
            }
        );
        assert_eq!(material.metalness, 1.0);
        assert!((material.roughness - 0.2).abs() < 1e-6);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let classifier = classifier(UnmatchedMaterialPolicy::KeepAuthored);
        assert_eq!(
            classifier.lookup("BIG_DIAMOND").map(|r| r.pattern.as_str()),
            Some("diamond")
        );
        assert_eq!(
            classifier.lookup("RoseGold_band").map(|r| r.pattern.as_str()),
            Some("rose")
        );
    }

    #[test]
    fn unmatched_keeps_authored_values() {
        let classifier = classifier(UnmatchedMaterialPolicy::KeepAuthored);
        let mut material = MaterialDescriptor::named("Leather");
        material.roughness = 0.8;
        material.base_color = [0.3, 0.2, 0.1, 1.0];
        let before = material.clone();
        assert_eq!(classifier.classify(&mut material), Classification::Authored);
        assert_eq!(material, before);
    }

    #[test]
    fn unmatched_uniform_forces_silver() {
        let classifier = classifier(UnmatchedMaterialPolicy::Uniform(
            ShadingProfile::polished_silver(),
        ));
        let mut material = MaterialDescriptor::named("Leather");
        material.base_color = [0.3, 0.2, 0.1, 0.4];
        assert_eq!(classifier.classify(&mut material), Classification::Uniform);
        assert_eq!(material.metalness, 1.0);
        assert!((material.roughness - 0.05).abs() < 1e-6);
        assert_eq!(material.base_color[3], 1.0);
    }

    #[test]
    fn uniform_all_ignores_rule_names() {
        let classifier = classifier(UnmatchedMaterialPolicy::UniformAll(
            ShadingProfile::polished_silver(),
        ));
        let mut material = MaterialDescriptor::named("Gold_Ring");
        assert_eq!(classifier.classify(&mut material), Classification::Uniform);
        assert!((material.roughness - 0.05).abs() < 1e-6);
        assert_eq!(material.base_color[..3], ShadingProfile::polished_silver().color);
    }

    #[test]
    fn apply_runs_once_per_asset() {
        let classifier = classifier(UnmatchedMaterialPolicy::Uniform(
            ShadingProfile::polished_silver(),
        ));
        let mut asset = unit_cube_asset("Ruby_Stone");
        let report = classifier.apply(&mut asset);
        assert_eq!(report.meshes.len(), 1);
        assert_eq!(report.rule_hits(), 1);
        assert!(asset.classified);

        let again = classifier.apply(&mut asset);
        assert!(again.meshes.is_empty());
    }

    #[test]
    fn srgb_hex_endpoints() {
        assert_eq!(srgb_hex(0x000000), [0.0, 0.0, 0.0]);
        let white = srgb_hex(0xffffff);
        assert!(white.iter().all(|c| (c - 1.0).abs() < 1e-6));
        let grey = srgb_hex(0xc0c0c0)[0];
        assert!(grey > 0.5 && grey < 0.55);
    }
}
