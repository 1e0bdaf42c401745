/// Defines a string-backed identifier enum.
///
/// Every enum gets a `Custom(String)` variant so that names supplied by callers
/// (for example a hand-written pipeline context naming a language this crate has
/// no probe for) survive a serde round trip instead of failing to decode.
#[macro_export]
macro_rules! define_id_enum {
    (
        $(#[$enum_meta:meta])*
        $enum_name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident => $serde_name:literal : $display_name:literal
                $( | $alias:literal )*
            ),* $(,)?
        }
    ) => {
        $(#[$enum_meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $enum_name {
            $(
                $(#[$variant_meta])*
                $variant,
            )*
            Custom(String),
        }

        impl serde::Serialize for $enum_name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for $enum_name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Ok(Self::from_name(&s).unwrap_or(Self::Custom(s)))
            }
        }

        impl schemars::JsonSchema for $enum_name {
            fn schema_name() -> String {
                stringify!($enum_name).to_string()
            }

            fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
                let mut schema = gen.subschema_for::<String>().into_object();
                let known: &[&str] = &[$($serde_name),*];
                schema.metadata().description = Some(format!(
                    "One of {}; other names are carried through as custom values",
                    known.join(", ")
                ));
                schema.into()
            }
        }

        impl $enum_name {
            /// Canonical serialized name
            pub fn as_str(&self) -> &str {
                match self {
                    $(
                        Self::$variant => $serde_name,
                    )*
                    Self::Custom(name) => name,
                }
            }

            /// Human-readable name
            pub fn name(&self) -> String {
                match self {
                    $(
                        Self::$variant => $display_name.to_string(),
                    )*
                    Self::Custom(name) => name.clone(),
                }
            }

            /// Case-insensitive lookup by serialized name, display name or alias
            pub fn from_name(name: &str) -> Option<Self> {
                let lower = name.to_ascii_lowercase();
                $(
                    if lower == $serde_name
                        || name.eq_ignore_ascii_case($display_name)
                        $( || lower == $alias )*
                    {
                        return Some(Self::$variant);
                    }
                )*
                None
            }

            pub fn all_variants() -> &'static [Self] {
                &[
                    $(
                        Self::$variant,
                    )*
                ]
            }

            pub fn is_custom(&self) -> bool {
                matches!(self, Self::Custom(_))
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}
