//! Fixed clinical vocabularies shared by the generator, the SQLite store and
//! the reports.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::Serialize;

/// Generates a closed vocabulary enum stored as TEXT in SQLite.
///
/// Each enum gets `ALL` (declaration order), `COUNT`, `as_str`, `ordinal`,
/// `Display`, `FromStr` and the rusqlite conversions.
macro_rules! vocabulary {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];
            pub const COUNT: usize = Self::ALL.len();

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }

            /// Position in `ALL`.
            pub fn ordinal(self) -> usize {
                self as usize
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = anyhow::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant),)+
                    _ => Err(anyhow::anyhow!("unknown {} value: {s:?}", stringify!($name))),
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|err: anyhow::Error| FromSqlError::Other(err.into()))
            }
        }
    };
}

vocabulary!(Sex {
    Male => "M",
    Female => "F",
});

vocabulary!(
    /// Coverage category of a patient.
    Insurance {
        Imss => "IMSS",
        Issste => "ISSSTE",
        Private => "Private",
        Uninsured => "Uninsured",
    }
);

vocabulary!(VisitReason {
    Checkup => "Checkup",
    AcutePain => "Acute pain",
    Extraction => "Extraction",
    Cleaning => "Cleaning",
    Orthodontics => "Orthodontics",
    Endodontics => "Endodontics",
    Implant => "Implant",
});

vocabulary!(
    /// Diagnosed condition. Each maps to exactly one ICD-10 code.
    Condition {
        Caries => "Caries",
        Gingivitis => "Gingivitis",
        Periodontitis => "Periodontitis",
        Pulpitis => "Pulpitis",
        Malocclusion => "Malocclusion",
        Edentulism => "Edentulism",
    }
);

impl Condition {
    pub fn icd10_code(self) -> &'static str {
        match self {
            Self::Caries => "K02",
            Self::Gingivitis => "K05.0",
            Self::Periodontitis => "K05.3",
            Self::Pulpitis => "K04.0",
            Self::Malocclusion => "K07.4",
            Self::Edentulism => "K08.1",
        }
    }
}

vocabulary!(
    /// Procedure performed during a visit.
    TreatmentType {
        Filling => "Filling",
        Extraction => "Extraction",
        Prophylaxis => "Prophylaxis",
        RootCanal => "Root canal",
        Crown => "Crown",
        Implant => "Implant",
        Braces => "Braces",
    }
);

impl TreatmentType {
    /// List price in MXN before the per-case jitter.
    pub fn base_cost(self) -> f64 {
        match self {
            Self::Filling => 800.0,
            Self::Extraction => 1_200.0,
            Self::Prophylaxis => 600.0,
            Self::RootCanal => 4_500.0,
            Self::Crown => 7_000.0,
            Self::Implant => 18_000.0,
            Self::Braces => 35_000.0,
        }
    }
}

vocabulary!(
    /// Reporting-only classification derived from the smoker/diabetic flags.
    RiskCategory {
        SmokerDiabetic => "Smoker + diabetic",
        SmokerOnly => "Smoker only",
        DiabeticOnly => "Diabetic only",
        Neither => "No risk factor",
    }
);

impl RiskCategory {
    pub fn classify(smoker: bool, diabetic: bool) -> Self {
        match (smoker, diabetic) {
            (true, true) => Self::SmokerDiabetic,
            (true, false) => Self::SmokerOnly,
            (false, true) => Self::DiabeticOnly,
            (false, false) => Self::Neither,
        }
    }

    /// SQL `CASE` expression equivalent to [`RiskCategory::classify`].
    pub fn sql_case(smoker: &str, diabetic: &str) -> String {
        [
            format!("CASE WHEN {smoker} = 1 AND {diabetic} = 1 THEN '{}'", Self::SmokerDiabetic),
            format!("            WHEN {smoker} = 1 THEN '{}'", Self::SmokerOnly),
            format!("            WHEN {diabetic} = 1 THEN '{}'", Self::DiabeticOnly),
            format!("            ELSE '{}' END", Self::Neither),
        ]
        .join("\n")
    }
}

vocabulary!(
    /// Fixed, non-overlapping age ranges used for grouping.
    AgeBracket {
        Under18 => "< 18",
        From18To34 => "18-34",
        From35To49 => "35-49",
        From50To64 => "50-64",
        From65 => "≥ 65",
    }
);

impl AgeBracket {
    /// Exclusive upper bound; `None` for the open-ended last bracket.
    pub fn upper_bound(self) -> Option<u8> {
        match self {
            Self::Under18 => Some(18),
            Self::From18To34 => Some(35),
            Self::From35To49 => Some(50),
            Self::From50To64 => Some(65),
            Self::From65 => None,
        }
    }

    pub fn for_age(age: u8) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|bracket| bracket.upper_bound().is_none_or(|bound| age < bound))
            .unwrap_or(Self::From65)
    }

    /// SQL `CASE` expression equivalent to [`AgeBracket::for_age`].
    pub fn sql_case(age: &str) -> String {
        let mut sql = String::from("CASE\n");
        for bracket in Self::ALL {
            match bracket.upper_bound() {
                Some(bound) => {
                    sql.push_str(&format!("            WHEN {age} < {bound} THEN '{bracket}'\n"))
                }
                None => sql.push_str(&format!("            ELSE '{bracket}'\n")),
            }
        }
        sql.push_str("        END");
        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_parses_its_own_labels() {
        for condition in Condition::ALL {
            assert_eq!(condition.as_str().parse::<Condition>().unwrap(), *condition);
        }
        for kind in TreatmentType::ALL {
            assert_eq!(kind.to_string().parse::<TreatmentType>().unwrap(), *kind);
        }
        let err = "Veneer".parse::<TreatmentType>().unwrap_err();
        assert!(err.to_string().contains("TreatmentType"));
    }

    #[test]
    fn test_vocabulary_sizes() {
        assert_eq!(Sex::COUNT, 2);
        assert_eq!(Insurance::COUNT, 4);
        assert_eq!(VisitReason::COUNT, 7);
        assert_eq!(Condition::COUNT, 6);
        assert_eq!(TreatmentType::COUNT, 7);
        assert_eq!(RiskCategory::COUNT, 4);
        assert_eq!(AgeBracket::COUNT, 5);
    }

    #[test]
    fn test_icd10_codes_are_distinct() {
        let mut codes: Vec<_> = Condition::ALL.iter().map(|c| c.icd10_code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), Condition::COUNT);
    }

    #[test]
    fn test_age_brackets_cover_patient_ages_exactly_once() {
        for age in 8..=80u8 {
            let bracket = AgeBracket::for_age(age);
            let matching = AgeBracket::ALL
                .iter()
                .filter(|candidate| {
                    let lower = candidate
                        .ordinal()
                        .checked_sub(1)
                        .and_then(|prev| AgeBracket::ALL[prev].upper_bound())
                        .unwrap_or(0);
                    age >= lower && candidate.upper_bound().is_none_or(|upper| age < upper)
                })
                .count();
            assert_eq!(matching, 1, "age {age} matched {matching} brackets");
            assert!(bracket.upper_bound().is_none_or(|upper| age < upper));
        }
        assert_eq!(AgeBracket::for_age(17), AgeBracket::Under18);
        assert_eq!(AgeBracket::for_age(18), AgeBracket::From18To34);
        assert_eq!(AgeBracket::for_age(64), AgeBracket::From50To64);
        assert_eq!(AgeBracket::for_age(65), AgeBracket::From65);
    }

    #[test]
    fn test_age_bracket_sql_case_lists_every_bracket() {
        let sql = AgeBracket::sql_case("p.age");
        assert!(sql.starts_with("CASE"));
        assert!(sql.contains("WHEN p.age < 18 THEN '< 18'"));
        assert!(sql.contains("ELSE '≥ 65'"));
        assert_eq!(sql.matches("WHEN").count(), 4);
    }

    #[test]
    fn test_risk_category_classification() {
        assert_eq!(RiskCategory::classify(true, true), RiskCategory::SmokerDiabetic);
        assert_eq!(RiskCategory::classify(true, false), RiskCategory::SmokerOnly);
        assert_eq!(RiskCategory::classify(false, true), RiskCategory::DiabeticOnly);
        assert_eq!(RiskCategory::classify(false, false), RiskCategory::Neither);
        let sql = RiskCategory::sql_case("p.smoker", "p.diabetic");
        assert!(sql.contains("'Smoker + diabetic'"));
        assert!(sql.contains("ELSE 'No risk factor' END"));
    }
}
