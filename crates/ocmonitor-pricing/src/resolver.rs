use ocmonitor_types::{ModelRef, PriceEntry, PriceField, PriceFields, PriceTier};
use std::collections::{BTreeMap, BTreeSet};

use crate::tiers::PriceTable;

/// Merges the user, project and remote tiers.
///
/// Resolution for one model walks the tiers in precedence order and, within a
/// tier, tries `provider/model` before bare `model`. Every field is taken from
/// the first place that supplies it and is never overwritten afterwards.
#[derive(Debug, Clone, Default)]
pub struct PriceResolver {
    tiers: BTreeMap<PriceTier, PriceTable>,
}

impl PriceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tier(mut self, tier: PriceTier, table: PriceTable) -> Self {
        self.tiers.insert(tier, table);
        self
    }

    pub fn set_tier(&mut self, tier: PriceTier, table: PriceTable) {
        self.tiers.insert(tier, table);
    }

    pub fn tier(&self, tier: PriceTier) -> Option<&PriceTable> {
        self.tiers.get(&tier)
    }

    /// Merged entry, or None when no tier knows the model at all.
    pub fn resolve(&self, model: &ModelRef) -> Option<PriceEntry> {
        let mut entry = PriceEntry::new(model.to_string());

        // BTreeMap iteration follows PriceTier's precedence order
        for (&tier, table) in &self.tiers {
            for key in model.lookup_keys() {
                if let Some(fields) = table.get(&key) {
                    fill(&mut entry, fields, tier);
                }
            }
        }

        if entry.fields.is_empty() {
            None
        } else {
            Some(entry)
        }
    }

    /// Resolve each model; unknown models are simply absent from the map.
    pub fn resolve_all<'m, I>(&self, models: I) -> BTreeMap<ModelRef, PriceEntry>
    where
        I: IntoIterator<Item = &'m ModelRef>,
    {
        models
            .into_iter()
            .filter_map(|model| self.resolve(model).map(|entry| (model.clone(), entry)))
            .collect()
    }

    /// Every key any tier knows about
    pub fn known_keys(&self) -> BTreeSet<String> {
        self.tiers
            .values()
            .flat_map(|table| table.keys().cloned())
            .collect()
    }
}

/// Copy every field `entry` does not have yet
fn fill(entry: &mut PriceEntry, fields: &PriceFields, tier: PriceTier) {
    fn take<T: Copy>(
        slot: &mut Option<T>,
        value: Option<T>,
        field: PriceField,
        tier: PriceTier,
        provenance: &mut BTreeMap<PriceField, PriceTier>,
    ) {
        if slot.is_none()
            && let Some(value) = value
        {
            *slot = Some(value);
            provenance.insert(field, tier);
        }
    }

    let target = &mut entry.fields;
    let provenance = &mut entry.provenance;
    take(&mut target.input_price, fields.input_price, PriceField::Input, tier, provenance);
    take(&mut target.output_price, fields.output_price, PriceField::Output, tier, provenance);
    take(
        &mut target.cache_read_price,
        fields.cache_read_price,
        PriceField::CacheRead,
        tier,
        provenance,
    );
    take(
        &mut target.cache_write_price,
        fields.cache_write_price,
        PriceField::CacheWrite,
        tier,
        provenance,
    );
    take(
        &mut target.context_window,
        fields.context_window,
        PriceField::ContextWindow,
        tier,
        provenance,
    );
    take(
        &mut target.session_quota,
        fields.session_quota,
        PriceField::SessionQuota,
        tier,
        provenance,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(&str, PriceFields)]) -> PriceTable {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn prices(input: Option<f64>, output: Option<f64>, context: Option<u64>) -> PriceFields {
        PriceFields {
            input_price: input,
            output_price: output,
            context_window: context,
            ..Default::default()
        }
    }

    #[test]
    fn test_remote_only_fills_gaps() {
        let model = ModelRef::bare("z-ai/glm-4.5-air");
        let resolver = PriceResolver::new()
            .with_tier(
                PriceTier::Project,
                table(&[("z-ai/glm-4.5-air", prices(Some(0.0), None, None))]),
            )
            .with_tier(
                PriceTier::Remote,
                table(&[("z-ai/glm-4.5-air", prices(Some(0.2), Some(1.1), Some(128_000)))]),
            );

        let entry = resolver.resolve(&model).unwrap();
        assert_eq!(entry.fields.input_price, Some(0.0));
        assert_eq!(entry.fields.context_window, Some(128_000));
        assert_eq!(entry.fields.output_price, Some(1.1));
        assert_eq!(entry.tier_of(PriceField::Input), Some(PriceTier::Project));
        assert_eq!(entry.tier_of(PriceField::ContextWindow), Some(PriceTier::Remote));
        assert_eq!(entry.origin(), Some(PriceTier::Project));
    }

    #[test]
    fn test_user_beats_project() {
        let model = ModelRef::bare("gpt-5");
        let resolver = PriceResolver::new()
            .with_tier(PriceTier::Project, table(&[("gpt-5", prices(Some(9.0), Some(9.0), None))]))
            .with_tier(PriceTier::User, table(&[("gpt-5", prices(Some(1.0), None, None))]));

        let entry = resolver.resolve(&model).unwrap();
        assert_eq!(entry.fields.input_price, Some(1.0));
        assert_eq!(entry.fields.output_price, Some(9.0));
    }

    #[test]
    fn test_qualified_key_before_bare_within_tier() {
        let model = ModelRef::new(Some("openrouter".to_string()), "glm");
        let resolver = PriceResolver::new().with_tier(
            PriceTier::User,
            table(&[
                ("glm", prices(Some(5.0), Some(5.0), Some(1_000))),
                ("openrouter/glm", prices(Some(1.0), None, None)),
            ]),
        );

        let entry = resolver.resolve(&model).unwrap();
        assert_eq!(entry.fields.input_price, Some(1.0));
        assert_eq!(entry.fields.output_price, Some(5.0));
        assert_eq!(entry.fields.context_window, Some(1_000));
    }

    #[test]
    fn test_lower_tier_cannot_override() {
        let model = ModelRef::bare("m");
        let base = PriceResolver::new()
            .with_tier(PriceTier::User, table(&[("m", prices(Some(1.0), Some(2.0), None))]));
        let before = base.resolve(&model).unwrap();

        let extended = base.clone().with_tier(
            PriceTier::Remote,
            table(&[("m", prices(Some(100.0), Some(200.0), Some(8_000)))]),
        );
        let after = extended.resolve(&model).unwrap();

        assert_eq!(after.fields.input_price, before.fields.input_price);
        assert_eq!(after.fields.output_price, before.fields.output_price);
        assert_eq!(after.fields.context_window, Some(8_000));
    }

    #[test]
    fn test_unknown_model_has_no_entry() {
        let resolver = PriceResolver::new()
            .with_tier(PriceTier::User, table(&[("known", prices(Some(0.0), Some(0.0), None))]));

        assert!(resolver.resolve(&ModelRef::bare("unknown")).is_none());

        let known = ModelRef::bare("known");
        let unknown = ModelRef::bare("unknown");
        let all = resolver.resolve_all([&known, &unknown]);
        assert_eq!(all.len(), 1);
        assert!(all.contains_key(&known));
    }
}
