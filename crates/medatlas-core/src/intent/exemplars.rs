//! Intent exemplar queries
//!
//! 4-7 hand-crafted exemplars per intent, frozen. The classifier embeds
//! these once at startup and scores a query by its mean top-2 cosine
//! similarity per intent. Changing an exemplar changes routing behavior;
//! update the classifier tests alongside.

use super::Intent;

/// Exemplar queries for every intent, in intent declaration order
pub const EXEMPLARS: [(Intent, &[&str]); 14] = [
    (
        Intent::Count,
        &[
            "how many hospitals are there",
            "how many clinics offer dialysis",
            "count the facilities in the region",
            "number of hospitals offering cardiology",
            "facilities in a region without orthopedic services",
            "total count of health centers",
        ],
    ),
    (
        Intent::Aggregate,
        &[
            "which region has the most facilities",
            "facilities per region breakdown",
            "distribution of specialties across regions",
            "aggregate bed capacity by region",
            "which region has the highest number of clinics",
        ],
    ),
    (
        Intent::AnomalyDetection,
        &[
            "find suspicious facility capability claims",
            "detect anomalies in the facility data",
            "which facilities look like outliers",
            "unusual bed to doctor ratios",
            "flag facilities making implausible claims",
        ],
    ),
    (
        Intent::Validation,
        &[
            "can this facility really perform neurosurgery",
            "validate the surgical claims of these facilities",
            "verify that the clinic can do cataract surgery",
            "are these capability claims plausible",
            "check whether the hospital meets requirements for dialysis",
        ],
    ),
    (
        Intent::DistanceQuery,
        &[
            "hospitals within 30 km of tamale",
            "how far is kumasi from accra",
            "distance between two cities",
            "nearest hospital to bolgatanga",
            "closest clinics near cape coast",
        ],
    ),
    (
        Intent::CoverageGap,
        &[
            "where are the coverage gaps for cardiology",
            "which areas are underserved",
            "find cold spots in emergency coverage",
            "gaps in coverage across the country",
        ],
    ),
    (
        Intent::MedicalDesert,
        &[
            "which regions are medical deserts",
            "regions far from any dialysis facility",
            "medical desert analysis for oncology",
            "which regions lack access to specialists",
        ],
    ),
    (
        Intent::SinglePointFailure,
        &[
            "single point of failure specialties",
            "which specialties depend on only one facility",
            "rare specialties offered by few facilities",
            "where would one closure remove a service entirely",
        ],
    ),
    (
        Intent::FacilityLookup,
        &[
            "tell me about korle bu teaching hospital",
            "details about ridge hospital",
            "information on the tamale teaching hospital",
            "look up this facility",
            "show me the profile of komfo anokye hospital",
        ],
    ),
    (
        Intent::ServiceSearch,
        &[
            "where can i get an mri scan",
            "facilities that provide dialysis services",
            "who offers chemotherapy treatment",
            "clinics providing antenatal services",
            "which facilities perform cataract surgery",
        ],
    ),
    (
        Intent::SpecialtySearch,
        &[
            "facilities with cardiology specialists",
            "facility with cardiac care capability",
            "find neurosurgery centers",
            "hospitals specializing in pediatrics",
            "oncology specialists in the country",
            "dermatology clinics",
        ],
    ),
    (
        Intent::Comparison,
        &[
            "compare ashanti and volta facilities",
            "ashanti versus northern region healthcare",
            "difference between accra and kumasi hospitals",
            "which city is better equipped",
        ],
    ),
    (
        Intent::Planning,
        &[
            "deploy a cardiology specialist across ghana",
            "where should we build a new hospital",
            "plan equipment distribution for ultrasound machines",
            "optimal route for a visiting specialist",
            "capacity planning for the regions",
            "emergency routing for a patient",
        ],
    ),
    (
        Intent::General,
        &[
            "what can you tell me about healthcare in ghana",
            "overview of the facility landscape",
            "help me explore the data",
            "what is in this dataset",
        ],
    ),
];
