//! Medical Reasoner
//!
//! Validates capability claims against a closed constraint catalog, runs the
//! two-stage anomaly detector (Isolation Forest intersected with Mahalanobis
//! gating), scans free text for red-flag patterns, and reports coverage gaps
//! and single-point-of-failure specialties.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::{Arc, OnceLock};

use crate::corpus::extract::{tokenize, GHANA_REGIONS};
use crate::corpus::{CorpusStore, EquipmentTag, Facility, Specialty, ALL_SPECIALTIES};
use crate::intent::Intent;
use crate::stats::{IsolationForest, MahalanobisDetector, CHI2_975_DF6};

use super::analyst::spof_entries;
use super::{
    Agent, AgentContext, AgentError, AgentName, AgentResult, AnomalyFlag, Citation,
    FacilitySummary, RedFlag, RegionCoverage, Severity, ValidationIssue, ValidationReport,
};

/// Isolation Forest contamination (fraction of rows flagged in stage 1)
const CONTAMINATION: f64 = 0.05;

/// Token-set similarity needed to tie a red flag to a specialty mention
const ADJACENCY_RATIO: f64 = 0.75;

/// Words on each side of a red-flag match scanned for a specialty
const ADJACENCY_WINDOW: usize = 5;

/// Validation targets are capped to keep reports readable
const MAX_VALIDATION_TARGETS: usize = 20;

// ============================================================================
// CONSTRAINT CATALOG
// ============================================================================

/// One advanced procedure and what performing it actually requires
struct Constraint {
    procedure: &'static str,
    /// Procedure-text keywords that signal the claim
    keywords: &'static [&'static str],
    /// Specialty tags that also signal the claim
    specialties: &'static [Specialty],
    required_equipment: &'static [EquipmentTag],
    min_beds: u32,
}

/// The closed knowledge base of 6 advanced procedures
const CONSTRAINTS: [Constraint; 6] = [
    Constraint {
        procedure: "neurosurgery",
        keywords: &["neurosurgery", "brain surgery", "craniotomy"],
        specialties: &[Specialty::Neurosurgery],
        required_equipment: &[
            EquipmentTag::Ct,
            EquipmentTag::Mri,
            EquipmentTag::Icu,
            EquipmentTag::OperatingTheater,
        ],
        min_beds: 50,
    },
    Constraint {
        procedure: "cardiac surgery",
        keywords: &["cardiac surgery", "open heart", "heart surgery", "bypass surgery"],
        specialties: &[],
        required_equipment: &[
            EquipmentTag::CardiacCatheterization,
            EquipmentTag::Icu,
            EquipmentTag::Ventilator,
        ],
        min_beds: 100,
    },
    Constraint {
        procedure: "cataract surgery",
        keywords: &["cataract"],
        specialties: &[],
        required_equipment: &[EquipmentTag::Ophthalmoscope, EquipmentTag::SurgicalMicroscope],
        min_beds: 5,
    },
    Constraint {
        procedure: "dialysis",
        keywords: &["dialysis", "renal replacement"],
        specialties: &[Specialty::Dialysis],
        required_equipment: &[EquipmentTag::DialysisMachine],
        min_beds: 10,
    },
    Constraint {
        procedure: "orthopedic surgery",
        keywords: &["orthopedic surgery", "orthopaedic surgery", "fracture repair", "joint replacement"],
        specialties: &[Specialty::Orthopedics],
        required_equipment: &[EquipmentTag::XRay, EquipmentTag::OperatingTheater],
        min_beds: 30,
    },
    Constraint {
        procedure: "oncology",
        keywords: &["oncology", "chemotherapy", "cancer treatment", "radiotherapy"],
        specialties: &[Specialty::Oncology],
        required_equipment: &[
            EquipmentTag::Ct,
            EquipmentTag::RadiationTherapy,
            EquipmentTag::Laboratory,
        ],
        min_beds: 50,
    },
];

impl Constraint {
    fn claimed_by(&self, facility: &Facility) -> bool {
        if self.specialties.iter().any(|&s| facility.has_specialty(s)) {
            return true;
        }
        facility.procedures.iter().any(|p| {
            let p = p.to_lowercase();
            self.keywords.iter().any(|kw| p.contains(kw))
        })
    }
}

// ============================================================================
// RED-FLAG PATTERNS
// ============================================================================

#[derive(Deserialize)]
struct RedFlagFile {
    categories: Vec<RedFlagCategory>,
}

#[derive(Deserialize)]
struct RedFlagCategory {
    name: String,
    patterns: Vec<String>,
}

fn red_flag_patterns() -> &'static Vec<(String, Vec<Regex>)> {
    static PATTERNS: OnceLock<Vec<(String, Vec<Regex>)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let raw = include_str!("../../data/red_flags.json");
        let file: RedFlagFile = serde_json::from_str(raw).expect("bundled red-flag file is valid");
        file.categories
            .into_iter()
            .map(|category| {
                let compiled = category
                    .patterns
                    .iter()
                    .map(|p| Regex::new(&format!("(?i){p}")).expect("bundled pattern compiles"))
                    .collect();
                (category.name, compiled)
            })
            .collect()
    })
}

/// Fuzzy token-set ratio: Levenshtein similarity of the sorted unique-token
/// joins of both strings
fn token_set_ratio(a: &str, b: &str) -> f64 {
    let mut ta = tokenize(a);
    let mut tb = tokenize(b);
    ta.sort();
    ta.dedup();
    tb.sort();
    tb.dedup();
    strsim::normalized_levenshtein(&ta.join(" "), &tb.join(" "))
}

/// Specialty mentioned within `ADJACENCY_WINDOW` words of the match span
fn adjacent_specialty(text: &str, match_start: usize, match_end: usize) -> Option<Specialty> {
    let before: Vec<&str> = text[..match_start].split_whitespace().rev().take(ADJACENCY_WINDOW).collect();
    let after: Vec<&str> = text[match_end..].split_whitespace().take(ADJACENCY_WINDOW).collect();
    let window = before
        .into_iter()
        .rev()
        .chain(after)
        .collect::<Vec<_>>()
        .join(" ");

    ALL_SPECIALTIES.into_iter().find(|specialty| {
        specialty
            .keywords()
            .iter()
            .any(|kw| token_set_ratio(&window, kw) >= ADJACENCY_RATIO || window.to_lowercase().contains(kw))
    })
}

/// Scan a facility's free text for red-flag patterns
fn scan_red_flags(facility: &Facility) -> Vec<RedFlag> {
    let text = facility
        .procedures
        .iter()
        .chain(&facility.equipment)
        .chain(&facility.capabilities)
        .cloned()
        .collect::<Vec<_>>()
        .join("; ");

    let mut flags = Vec::new();
    for (category, patterns) in red_flag_patterns() {
        for pattern in patterns {
            if let Some(m) = pattern.find(&text) {
                flags.push(RedFlag {
                    category: category.clone(),
                    matched_text: m.as_str().to_string(),
                    near_specialty: adjacent_specialty(&text, m.start(), m.end())
                        .map(|s| s.to_string()),
                });
            }
        }
    }
    flags
}

// ============================================================================
// VALIDATOR AGENT
// ============================================================================

/// Constraint checking, anomaly gating, and structural risk analysis
pub struct ValidatorAgent {
    corpus: Arc<CorpusStore>,
}

impl ValidatorAgent {
    pub fn new(corpus: Arc<CorpusStore>) -> Self {
        Self { corpus }
    }

    /// Diminishing-penalty confidence: repeated issues of the same severity
    /// cost less and less, floored at 0.10
    fn claim_confidence(num_specialties: usize, issues: &[ValidationIssue]) -> f64 {
        let mut confidence = (0.65 + 0.03 * num_specialties as f64).min(0.95);
        let mut highs = 0;
        let mut mediums = 0;
        for issue in issues {
            match issue.severity {
                Severity::High | Severity::Critical => {
                    confidence -= match highs {
                        0 => 0.15,
                        1 => 0.10,
                        _ => 0.05,
                    };
                    highs += 1;
                }
                Severity::Medium => {
                    confidence -= if mediums == 0 { 0.08 } else { 0.04 };
                    mediums += 1;
                }
            }
        }
        confidence.max(0.10)
    }

    fn validate_facility(facility: &Facility) -> ValidationReport {
        let mut issues = Vec::new();
        for constraint in &CONSTRAINTS {
            if !constraint.claimed_by(facility) {
                continue;
            }
            for &tag in constraint.required_equipment {
                if !facility.has_capability(tag) {
                    issues.push(ValidationIssue {
                        procedure: constraint.procedure.to_string(),
                        missing: tag.to_string(),
                        severity: Severity::High,
                    });
                }
            }
            if facility.capacity < constraint.min_beds {
                issues.push(ValidationIssue {
                    procedure: constraint.procedure.to_string(),
                    missing: format!(
                        "{} beds (has {})",
                        constraint.min_beds, facility.capacity
                    ),
                    severity: Severity::Medium,
                });
            }
        }

        let confidence = Self::claim_confidence(facility.specialties.len(), &issues);
        ValidationReport {
            facility: FacilitySummary::from_facility(facility),
            issues,
            red_flags: scan_red_flags(facility),
            confidence,
        }
    }

    /// Validate prior searcher hits when present, otherwise the
    /// parameter-filtered corpus
    fn validation_targets<'a>(&'a self, ctx: &AgentContext<'_>) -> Vec<&'a Facility> {
        if let Some(AgentResult::SemanticSearch { facilities, .. }) =
            ctx.prior.get(&AgentName::Searcher)
        {
            let from_search: Vec<&Facility> = facilities
                .iter()
                .filter_map(|f| self.corpus.get(&f.facility.id))
                .take(MAX_VALIDATION_TARGETS)
                .collect();
            if !from_search.is_empty() {
                return from_search;
            }
        }

        let params = ctx.params;
        self.corpus
            .filter(|f| {
                params.specialty.is_none_or(|s| f.has_specialty(s))
                    && params
                        .region
                        .as_ref()
                        .is_none_or(|r| f.region.eq_ignore_ascii_case(r))
                    && params.facility_type.is_none_or(|t| f.facility_type == t)
            })
            .into_iter()
            .take(MAX_VALIDATION_TARGETS)
            .collect()
    }

    fn validate(&self, ctx: &AgentContext<'_>) -> AgentResult {
        let validated: Vec<ValidationReport> = self
            .validation_targets(ctx)
            .into_iter()
            .map(Self::validate_facility)
            .collect();

        let citations = validated
            .iter()
            .flat_map(|report| {
                report.issues.iter().take(3).map(|issue| Citation {
                    facility_id: report.facility.id.clone(),
                    field: "equipment".to_string(),
                    value: format!("{}: missing {}", issue.procedure, issue.missing),
                    confidence: report.confidence,
                    step_index: ctx.step_index,
                })
            })
            .collect();

        AgentResult::Validation { validated, citations }
    }

    /// Six features per facility: set sizes plus the two capacity figures
    fn features(facility: &Facility) -> Vec<f64> {
        vec![
            facility.specialties.len() as f64,
            facility.procedures.len() as f64,
            facility.equipment.len() as f64,
            facility.capabilities.len() as f64,
            facility.capacity as f64,
            facility.doctors as f64,
        ]
    }

    /// Rule-based reason strings for a flagged facility
    fn anomaly_reasons(facility: &Facility) -> Vec<String> {
        let mut reasons = Vec::new();
        let procedures = facility.procedures.len();
        let equipment = facility.equipment.len();
        let specialties = facility.specialties.len();
        if procedures > 10 && equipment < 2 {
            reasons.push("procedures > 10 && equipment < 2".to_string());
        }
        if facility.bed_doctor_ratio().is_some_and(|r| r > 50.0) {
            reasons.push("ratio > 50".to_string());
        }
        if specialties > 8 {
            reasons.push("specialties > 8".to_string());
        }
        if procedures > 15 && facility.capacity < 20 {
            reasons.push("procedures > 15 && capacity < 20".to_string());
        }
        reasons
    }

    fn anomaly_scan(&self, ctx: &AgentContext<'_>) -> AgentResult {
        let facilities: Vec<&Facility> = self.corpus.all().collect();
        let rows: Vec<Vec<f64>> = facilities.iter().map(|f| Self::features(f)).collect();

        let Some(forest) = IsolationForest::fit(&rows) else {
            return AgentResult::AnomalyScan {
                flagged: vec![],
                isolation_outliers: 0,
                mahalanobis_outliers: 0,
                mahalanobis_skipped: true,
                citations: vec![],
            };
        };
        let stage1 = forest.outliers(&rows, CONTAMINATION);

        // Stage 2 needs more rows than features and a non-singular
        // covariance; otherwise report stage 1 alone and say so
        let detector = MahalanobisDetector::fit(&rows);
        let (flagged_indices, stage2_count, skipped) = match &detector {
            Some(detector) => {
                let stage2 = detector.outliers(&rows, CHI2_975_DF6);
                let intersection: Vec<usize> = stage1
                    .iter()
                    .copied()
                    .filter(|i| stage2.contains(i))
                    .collect();
                (intersection, stage2.len(), false)
            }
            None => {
                tracing::warn!("Mahalanobis stage skipped (degenerate features)");
                (stage1.clone(), 0, true)
            }
        };

        let flagged: Vec<AnomalyFlag> = flagged_indices
            .iter()
            .map(|&i| AnomalyFlag {
                facility: FacilitySummary::from_facility(facilities[i]),
                isolation_score: forest.score(&rows[i]),
                mahalanobis_sq: detector.as_ref().map(|d| d.distance_sq(&rows[i])),
                reasons: Self::anomaly_reasons(facilities[i]),
            })
            .collect();

        let citations = flagged
            .iter()
            .map(|flag| Citation {
                facility_id: flag.facility.id.clone(),
                field: "capabilities".to_string(),
                value: flag.reasons.join("; "),
                confidence: flag.isolation_score,
                step_index: ctx.step_index,
            })
            .collect();

        AgentResult::AnomalyScan {
            isolation_outliers: stage1.len(),
            mahalanobis_outliers: stage2_count,
            mahalanobis_skipped: skipped,
            flagged,
            citations,
        }
    }

    fn coverage_by_region(&self, ctx: &AgentContext<'_>) -> AgentResult {
        let specialty = ctx.params.specialty;
        let counts: Vec<(String, usize)> = GHANA_REGIONS
            .iter()
            .map(|&region| {
                let count = self
                    .corpus
                    .by_region(region)
                    .into_iter()
                    .filter(|f| specialty.is_none_or(|s| f.has_specialty(s)))
                    .count();
                (region.to_string(), count)
            })
            .collect();

        let mut sorted: Vec<f64> = counts.iter().map(|&(_, c)| c as f64).collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let median = crate::stats::percentile(&sorted, 50.0);

        let mut gaps: Vec<RegionCoverage> = counts
            .into_iter()
            .filter_map(|(region, count)| {
                let severity = match count {
                    0 => Severity::Critical,
                    1 => Severity::High,
                    c if (c as f64) < median => Severity::Medium,
                    _ => return None,
                };
                Some(RegionCoverage { region, facility_count: count, severity })
            })
            .collect();
        gaps.sort_by_key(|g| g.facility_count);

        let citations = gaps
            .iter()
            .take(5)
            .flat_map(|gap| {
                self.corpus.by_region(&gap.region).into_iter().take(1).map(|f| Citation {
                    facility_id: f.id.clone(),
                    field: "region".to_string(),
                    value: gap.region.clone(),
                    confidence: 1.0,
                    step_index: ctx.step_index,
                })
            })
            .collect();

        AgentResult::CoverageByRegion {
            specialty: specialty.map(|s| s.to_string()),
            gaps,
            citations,
        }
    }

    fn single_point_of_failure(&self, ctx: &AgentContext<'_>) -> AgentResult {
        let (rare_specialties, results) = spof_entries(&self.corpus);
        let citations = results
            .iter()
            .flat_map(|entry| {
                entry.facilities.iter().map(|f| Citation {
                    facility_id: f.id.clone(),
                    field: "specialties".to_string(),
                    value: entry.specialty.clone(),
                    confidence: 1.0,
                    step_index: ctx.step_index,
                })
            })
            .collect();
        AgentResult::SinglePointOfFailure { rare_specialties, results, citations }
    }
}

#[async_trait]
impl Agent for ValidatorAgent {
    fn name(&self) -> AgentName {
        AgentName::Validator
    }

    async fn run(&self, ctx: &AgentContext<'_>) -> Result<AgentResult, AgentError> {
        let result = match ctx.intent {
            Intent::AnomalyDetection => self.anomaly_scan(ctx),
            Intent::CoverageGap | Intent::MedicalDesert => self.coverage_by_region(ctx),
            Intent::SinglePointFailure => self.single_point_of_failure(ctx),
            _ => self.validate(ctx),
        };
        Ok(result)
    }
}

// ============================================================================
// TESTS
// ============================================================================
