//! Closed OME vocabularies used by instrument and channel attributes.
use std::fmt::{self, Display};
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{value:?} is not a term in the {vocabulary} vocabulary")]
pub struct UnknownTerm {
    pub vocabulary: &'static str,
    pub value: String,
}

macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $term:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $term,)+
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownTerm;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($term => Ok(Self::$variant),)+
                    _ => Err(UnknownTerm {
                        vocabulary: stringify!($name),
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

vocabulary!(
    /// The `Type` of a `Microscope`
    MicroscopeType {
        Upright => "Upright",
        Inverted => "Inverted",
        Dissection => "Dissection",
        Electrophysiology => "Electrophysiology",
        Other => "Other",
    }
);

vocabulary!(
    /// The `Type` of a `Detector`
    DetectorType {
        CCD => "CCD",
        IntensifiedCCD => "IntensifiedCCD",
        AnalogVideo => "AnalogVideo",
        PMT => "PMT",
        Photodiode => "Photodiode",
        Spectroscopy => "Spectroscopy",
        LifetimeImaging => "LifetimeImaging",
        CorrelationSpectroscopy => "CorrelationSpectroscopy",
        FTIR => "FTIR",
        EMCCD => "EMCCD",
        APD => "APD",
        CMOS => "CMOS",
        EBCCD => "EBCCD",
        Other => "Other",
    }
);

vocabulary!(
    /// The `Immersion` medium of an `Objective`
    Immersion {
        Oil => "Oil",
        Water => "Water",
        WaterDipping => "WaterDipping",
        Air => "Air",
        Multi => "Multi",
        Glycerol => "Glycerol",
        Other => "Other",
    }
);

vocabulary!(
    IlluminationType {
        Transmitted => "Transmitted",
        Epifluorescence => "Epifluorescence",
        Oblique => "Oblique",
        NonLinear => "NonLinear",
        Other => "Other",
    }
);

vocabulary!(
    AcquisitionMode {
        WideField => "WideField",
        LaserScanningConfocalMicroscopy => "LaserScanningConfocalMicroscopy",
        SpinningDiskConfocal => "SpinningDiskConfocal",
        SlitScanConfocal => "SlitScanConfocal",
        MultiPhotonMicroscopy => "MultiPhotonMicroscopy",
        StructuredIllumination => "StructuredIllumination",
        SingleMoleculeImaging => "SingleMoleculeImaging",
        TotalInternalReflection => "TotalInternalReflection",
        FluorescenceLifetime => "FluorescenceLifetime",
        SpectralImaging => "SpectralImaging",
        FluorescenceCorrelationSpectroscopy => "FluorescenceCorrelationSpectroscopy",
        NearFieldScanningOpticalMicroscopy => "NearFieldScanningOpticalMicroscopy",
        SecondHarmonicGenerationImaging => "SecondHarmonicGenerationImaging",
        PALM => "PALM",
        STORM => "STORM",
        STED => "STED",
        TIRF => "TIRF",
        FSM => "FSM",
        LCM => "LCM",
        BrightField => "BrightField",
        SweptFieldConfocal => "SweptFieldConfocal",
        SPIM => "SPIM",
        Other => "Other",
    }
);

vocabulary!(
    ContrastMethod {
        Brightfield => "Brightfield",
        Phase => "Phase",
        DIC => "DIC",
        HoffmanModulation => "HoffmanModulation",
        ObliqueIllumination => "ObliqueIllumination",
        PolarizedLight => "PolarizedLight",
        Darkfield => "Darkfield",
        Fluorescence => "Fluorescence",
        Other => "Other",
    }
);

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_terms() {
        assert_eq!("EMCCD".parse::<DetectorType>().unwrap(), DetectorType::EMCCD);
        assert_eq!(Immersion::WaterDipping.to_string(), "WaterDipping");
        let err = "Vacuum".parse::<Immersion>().unwrap_err();
        assert_eq!(err.vocabulary, "Immersion");
        assert!(err.to_string().contains("Vacuum"));
    }
}
