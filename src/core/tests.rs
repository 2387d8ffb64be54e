#[cfg(test)]
mod tests_impl {
    use crate::codec::action::{
        AlertSound, Beam, DropSound, EffectColor, IconShape, IconSize, MinimapIcon, Rgba,
        SoundSource,
    };
    use crate::codec::condition::{Condition, Operator};
    use crate::codec::{import, serialize};
    use crate::command::{
        ActionUpdate, InsertEntry, MoveEntry, MoveItem, RemoveBase, SetAction, SetCondition,
        SetEntryActive,
    };
    use crate::core::filter::Filter;
    use crate::core::test_helpers::{belt_rule, sample_tree, test_catalog};
    use crate::core::tree::{Block, Category, Rule, RuleTree};

    fn styled_rule() -> Rule {
        let mut rule = belt_rule("Belts", &["Leather Belt", "Chain Belt"]);
        rule.conditions
            .set("ItemLevel", Some(Condition::number(Operator::Gte, 82.0)));
        rule.conditions.set(
            "Rarity",
            Some(Condition::list(Some(Operator::Lte), ["Rare"])),
        );
        rule.actions.font_size = Some(40.0);
        rule.actions.text = Some(Rgba::new(255.0, 0.0, 0.0, 255.0));
        rule.actions.border = Some(Rgba::new(255.0, 255.0, 255.0, 200.0));
        rule.actions.icon = Some(MinimapIcon {
            size: IconSize::Large,
            color: EffectColor::Red,
            shape: IconShape::Star,
            enabled: true,
        });
        rule.actions.beam = Some(Beam {
            color: EffectColor::Red,
            temp: true,
            enabled: true,
        });
        rule.actions.drop_sound = Some(DropSound {
            enabled: true,
            toggle: false,
        });
        rule.actions.sound = Some(AlertSound {
            enabled: true,
            source: SoundSource::Builtin { id: 6 },
            volume: 300,
            positional: false,
            optional: false,
        });
        rule
    }

    #[test]
    fn test_serialize_import_roundtrip() {
        let mut tree = RuleTree::new();
        let original = styled_rule();
        tree.insert_rule(original.clone(), tree.root().id).unwrap();
        let mut hidden = belt_rule("Currency", &["Divine Orb"]);
        hidden.block = Block::Hide;
        hidden.continue_matching = true;
        tree.insert_rule(hidden, tree.root().id).unwrap();

        let text = serialize(&tree);
        let outcome = import(&text, &test_catalog());
        assert!(outcome.is_clean(), "{:?}", outcome.diagnostics);

        let rules = outcome.tree.rules();
        assert_eq!(rules.len(), 2);

        let belts = rules[0];
        assert_eq!(belts.name, "Belts");
        assert_eq!(belts.block, Block::Show);
        let bases: Vec<_> = belts.bases.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(bases, ["Leather Belt", "Chain Belt"]);
        assert_eq!(belts.actions, original.actions);
        assert_eq!(belts.conditions, original.conditions);

        let currency = rules[1];
        assert_eq!(currency.block, Block::Hide);
        assert!(currency.continue_matching);
        assert_eq!(currency.bases[0].value, Some(180.0));

        // Second pass is a fixed point
        assert_eq!(serialize(&outcome.tree), text);
    }

    #[test]
    fn test_disabled_rules_do_not_survive_roundtrip() {
        let (mut tree, ids) = sample_tree();
        tree.insert_rule(belt_rule("Other", &["Heavy Belt"]), tree.root().id)
            .unwrap();
        tree.set_enabled(ids.belts, false).unwrap();

        let outcome = import(&serialize(&tree), &test_catalog());
        let names: Vec<_> = outcome.tree.rules().iter().map(|r| r.name.clone()).collect();
        assert_eq!(names, ["Other"]);
    }

    #[test]
    fn test_header_like_names_survive_roundtrip() {
        let mut tree = RuleTree::new();
        for name in ["[1] A", "Later", "Hide the rest"] {
            tree.insert_rule(belt_rule(name, &[]), tree.root().id).unwrap();
        }

        let text = serialize(&tree);
        let outcome = import(&text, &test_catalog());
        assert!(outcome.is_clean(), "{:?}", outcome.diagnostics);
        let names: Vec<_> = outcome.tree.rules().iter().map(|r| r.name.clone()).collect();
        assert_eq!(names, ["[1] A", "Later", "Hide the rest"]);
        assert_eq!(serialize(&outcome.tree), text);
    }

    #[test]
    fn test_enabled_propagation_through_categories() {
        let (mut tree, ids) = sample_tree();

        tree.set_enabled(ids.category, false).unwrap();
        assert!(!tree.rule(ids.belts).unwrap().enabled);
        assert!(!tree.item(ids.chain).unwrap().enabled);

        tree.set_enabled(ids.chain, true).unwrap();
        assert!(tree.rule(ids.belts).unwrap().enabled);
        assert!(tree.get(ids.category).unwrap().enabled());
        assert!(!tree.item(ids.leather).unwrap().enabled);

        tree.set_enabled(ids.chain, false).unwrap();
        assert!(!tree.rule(ids.belts).unwrap().enabled);
        assert!(!tree.get(ids.category).unwrap().enabled());
    }

    #[test]
    fn test_undo_of_mixed_edits_restores_text() {
        let (tree, ids) = sample_tree();
        let mut filter = Filter::from_tree("mixed", tree);
        let before = filter.serialize();

        let other = belt_rule("Heavy", &["Heavy Belt"]);
        let other_id = other.id;
        let root = filter.rules().root().id;
        filter
            .execute(&InsertEntry {
                parent: root,
                entry: other.into(),
                index: Some(0),
            })
            .unwrap();
        filter
            .execute(&MoveItem {
                item_id: ids.chain,
                index: 0,
                source_rule: ids.belts,
                target_rule: other_id,
            })
            .unwrap();
        filter
            .execute(&SetAction {
                rule_id: other_id,
                update: ActionUpdate::TextColor(Some(Rgba::new(0.0, 255.0, 0.0, 255.0))),
            })
            .unwrap();
        filter
            .execute(&SetCondition {
                rule_id: ids.belts,
                name: "DropLevel".into(),
                condition: Some(Condition::number(Operator::Gt, 50.0)),
            })
            .unwrap();
        filter.execute(&RemoveBase { item_id: ids.leather }).unwrap();
        filter
            .execute(&MoveEntry {
                id: ids.category,
                target_parent: root,
                index: 0,
            })
            .unwrap();
        let after = filter.serialize();
        assert_ne!(before, after);
        assert_eq!(filter.undo_count(), 6);

        while filter.undo().unwrap().is_some() {}
        assert_eq!(filter.serialize(), before);
        assert_eq!(filter.rules().parent_of(ids.chain), Some(ids.belts));

        while filter.redo().unwrap().is_some() {}
        assert_eq!(filter.serialize(), after);
    }

    #[test]
    fn test_category_subtree_undo() {
        let (tree, ids) = sample_tree();
        let mut filter = Filter::from_tree("cats", tree);
        let mut nested = Category::new("Nested");
        nested.children.push(belt_rule("Inner", &["Heavy Belt"]).into());
        let nested_id = nested.id;

        filter
            .execute(&InsertEntry {
                parent: ids.category,
                entry: nested.into(),
                index: None,
            })
            .unwrap();
        filter
            .execute(&SetEntryActive::new(ids.category, false))
            .unwrap();
        assert!(!filter.rules().get(nested_id).unwrap().enabled());

        filter.undo().unwrap();
        assert!(filter.rules().get(nested_id).unwrap().enabled());
        filter.undo().unwrap();
        assert!(!filter.rules().contains(nested_id));
    }

    #[test]
    fn test_builtin_catalog_resolves_common_bases() {
        let outcome = import(
            "Show\n  Class == \"Belts\"\n  BaseType == \"Heavy Belt\" \"Divine Orb\"\n",
            crate::core::catalog::ItemCatalog::builtin(),
        );
        assert!(outcome.is_clean(), "{:?}", outcome.diagnostics);
        assert_eq!(outcome.tree.rules()[0].bases.len(), 2);
    }
}
