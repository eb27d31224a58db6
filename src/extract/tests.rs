use super::*;
use crate::binding::{Param, ParamValue};
use crate::generate::{full_keymap, FormatContext};
use crate::layout::{Combo, HoldTap, Macro};

fn init_log() {
    use simplelog::*;
    use std::sync::OnceLock;
    static LOG_INIT: OnceLock<()> = OnceLock::new();
    LOG_INIT.get_or_init(|| {
        // Note: set to a different level to see logs in tests.
        let _ = TermLogger::init(
            LevelFilter::Error,
            Config::default(),
            TerminalMode::Stderr,
            ColorChoice::AlwaysAnsi,
        );
    });
}

fn extract(src: &str) -> Extraction {
    init_log();
    let roots = crate::dts::parse_source(src, "test").unwrap();
    extract_layout(&roots).unwrap()
}

#[test]
fn minimal_keymap_extracts_layers_in_order() {
    let e = extract(
        r#"/ { keymap { compatible = "zmk,keymap"; default_layer { bindings = <&kp A &kp B>; }; }; };"#,
    );
    assert!(e.warnings.is_empty());
    let doc = e.layout;
    assert_eq!(doc.layer_names, vec!["default_layer"]);
    assert_eq!(
        doc.layers[0],
        vec![
            Binding::new("&kp", vec![Param::name("A")]),
            Binding::new("&kp", vec![Param::name("B")]),
        ]
    );
}

#[test]
fn minimal_keymap_survives_a_generate_parse_cycle() {
    let e = extract(
        r#"/ { keymap { compatible = "zmk,keymap"; default_layer { bindings = <&kp A &kp B>; }; }; };"#,
    );
    let text = full_keymap(&e.layout, &FormatContext::default()).unwrap();
    let back = extract(&text).layout;
    assert_eq!(back.layer_names, e.layout.layer_names);
    assert_eq!(back.layers, e.layout.layers);
}

#[test]
fn hold_tap_extraction_reads_the_full_property_set() {
    let e = extract(
        r#"/ { behaviors {
            hm: homerow_mods {
                compatible = "zmk,behavior-hold-tap";
                tapping-term-ms = <200>;
                flavor = "tap-preferred";
                bindings = <&kp>, <&kp>;
                #binding-cells = <2>;
            };
        }; };"#,
    );
    assert!(e.warnings.is_empty());
    let ht = &e.layout.hold_taps[0];
    assert_eq!(ht.name, "hm");
    assert_eq!(ht.tapping_term_ms, Some(200));
    assert_eq!(ht.flavor.as_deref(), Some("tap-preferred"));
    assert_eq!(
        ht.bindings,
        vec![Binding::new("&kp", vec![]), Binding::new("&kp", vec![])]
    );
    assert_eq!(ht.quick_tap_ms, None);
    assert_eq!(ht.hold_trigger_key_positions, None);
}

#[test]
fn hold_tap_trigger_positions_and_flags() {
    let e = extract(
        r#"/ { behaviors {
            hr: hr {
                compatible = "zmk,behavior-hold-tap";
                bindings = <&kp>, <&kp>;
                hold-trigger-key-positions = <5 6 7>;
                hold-trigger-on-release;
                retro-tap;
            };
        }; };"#,
    );
    let ht = &e.layout.hold_taps[0];
    assert_eq!(ht.hold_trigger_key_positions, Some(vec![5, 6, 7]));
    assert_eq!(ht.hold_trigger_on_release, Some(true));
    assert_eq!(ht.retro_tap, Some(true));
}

#[test]
fn combo_with_layer_indices() {
    let e = extract(
        r#"/ { combos { compatible = "zmk,combos";
            combo_esc {
                timeout-ms = <30>;
                key-positions = <0 1>;
                bindings = <&kp ESC>;
                layers = <0 1>;
            };
        }; };"#,
    );
    assert!(e.warnings.is_empty());
    let combo = &e.layout.combos[0];
    assert_eq!(combo.name, "combo_esc");
    assert_eq!(combo.key_positions, vec![0, 1]);
    assert_eq!(combo.timeout_ms, Some(30));
    assert_eq!(combo.bindings, Binding::new("&kp", vec![Param::name("ESC")]));
    assert_eq!(combo.layers, vec![0, 1]);
}

#[test]
fn combo_layers_accept_names_and_normalize_to_indices() {
    let e = extract(
        r#"/ {
            keymap { compatible = "zmk,keymap";
                base { bindings = <&kp A>; };
                nav { bindings = <&kp B>; };
            };
            combos { compatible = "zmk,combos";
                c { key-positions = <0 1>; bindings = <&kp ESC>; layers = <nav>; };
            };
        };"#,
    );
    assert_eq!(e.layout.combos[0].layers, vec![1]);
}

#[test]
fn define_substitution_is_applied_during_extraction() {
    let e = extract(
        "#define BASE 0\n/ { combos { compatible = \"zmk,combos\"; c { key-positions = <0 1>; bindings = <&mo BASE>; }; }; };",
    );
    let combo = &e.layout.combos[0];
    assert_eq!(combo.bindings.to_string(), "&mo 0");
    assert_eq!(combo.bindings.params, vec![Param::int(0)]);
}

#[test]
fn define_substitution_applies_to_layer_bindings() {
    let e = extract(
        "#define NAV 2\n/ { keymap { compatible = \"zmk,keymap\"; base { bindings = <&mo NAV &kp A>; }; }; };",
    );
    assert_eq!(e.layout.layers[0][0].to_string(), "&mo 2");
}

#[test]
fn nested_function_calls_become_nested_params() {
    let e = extract(
        r#"/ { keymap { compatible = "zmk,keymap"; base { bindings = <&kp LC(LA(DEL))>; }; }; };"#,
    );
    let binding = &e.layout.layers[0][0];
    assert_eq!(
        binding,
        &Binding::new(
            "&kp",
            vec![Param::call("LC", vec![Param::call("LA", vec![Param::name("DEL")])])]
        )
    );
    assert_eq!(binding.to_string(), "&kp LC(LA(DEL))");
}

#[test]
fn macro_extraction_reads_timing_and_bindings() {
    let e = extract(
        r#"/ { macros {
            hello: hello {
                compatible = "zmk,behavior-macro";
                #binding-cells = <0>;
                wait-ms = <40>;
                tap-ms = <40>;
                bindings = <&kp H>, <&kp E>, <&kp L>, <&kp L>, <&kp O>;
            };
        }; };"#,
    );
    let m = &e.layout.macros[0];
    assert_eq!(m.name, "hello");
    assert_eq!(m.wait_ms, Some(40));
    assert_eq!(m.tap_ms, Some(40));
    assert_eq!(m.param_count, None);
    assert_eq!(m.bindings.len(), 5);
    assert_eq!(m.bindings[0].to_string(), "&kp H");
}

#[test]
fn one_param_macro_compatible_sets_param_count() {
    let e = extract(
        r#"/ { macros {
            pm: pm {
                compatible = "zmk,behavior-macro-one-param";
                #binding-cells = <1>;
                bindings = <&macro_param_1to1>, <&kp MACRO_PLACEHOLDER>;
            };
        }; };"#,
    );
    assert_eq!(e.layout.macros[0].param_count, Some(1));
}

#[test]
fn sticky_key_and_caps_word_and_mod_morph() {
    let e = extract(
        r#"/ { behaviors {
            skq: skq {
                compatible = "zmk,behavior-sticky-key";
                release-after-ms = <1000>;
                quick-release;
                bindings = <&kp>;
            };
            cw: cw {
                compatible = "zmk,behavior-caps-word";
                continue-list = <UNDERSCORE MINUS>;
            };
            shifty: shifty {
                compatible = "zmk,behavior-mod-morph";
                bindings = <&kp DOT>, <&kp COLON>;
                mods = <(MOD_LSFT|MOD_RSFT)>;
            };
        }; };"#,
    );
    assert!(e.warnings.is_empty());
    let sk = &e.layout.sticky_keys[0];
    assert_eq!(sk.release_after_ms, Some(1000));
    assert_eq!(sk.quick_release, Some(true));
    assert_eq!(sk.lazy, None);
    let cw = &e.layout.caps_words[0];
    assert_eq!(cw.continue_list, vec!["UNDERSCORE", "MINUS"]);
    let mm = &e.layout.mod_morphs[0];
    assert_eq!(mm.mods.as_deref(), Some("(MOD_LSFT|MOD_RSFT)"));
    assert_eq!(mm.bindings.len(), 2);
}

#[test]
fn input_listener_from_a_root_override() {
    let e = extract(
        r#"&zip_xy_listener {
            scroller {
                layers = <2>;
                input-processors = <&zip_xy_scaler 2 1>;
            };
        };"#,
    );
    let listener = &e.layout.input_listeners[0];
    assert_eq!(listener.code, "&zip_xy_listener");
    assert_eq!(listener.nodes[0].code, "scroller");
    assert_eq!(listener.nodes[0].layers, vec![2]);
    assert_eq!(
        listener.nodes[0].input_processors[0].to_string(),
        "&zip_xy_scaler 2 1"
    );
}

#[test]
fn broken_behavior_is_a_warning_not_a_failure() {
    let e = extract(
        r#"/ { behaviors {
            broken: broken { compatible = "zmk,behavior-hold-tap"; };
            ok: ok { compatible = "zmk,behavior-hold-tap"; bindings = <&kp>, <&kp>; };
        }; };"#,
    );
    assert_eq!(e.warnings.len(), 1);
    assert_eq!(e.warnings[0].kind, ErrorKind::Extract);
    assert_eq!(e.layout.hold_taps.len(), 1);
    assert_eq!(e.layout.hold_taps[0].name, "ok");
}

#[test]
fn extraction_preserves_source_order_per_kind() {
    let e = extract(
        r#"/ { behaviors {
            b: b { compatible = "zmk,behavior-hold-tap"; bindings = <&kp>, <&kp>; };
            a: a { compatible = "zmk,behavior-hold-tap"; bindings = <&kp>, <&kp>; };
        }; };"#,
    );
    let names: Vec<&str> = e.layout.hold_taps.iter().map(|h| h.name.as_str()).collect();
    assert_eq!(names, vec!["b", "a"]);
}

#[test]
fn document_to_keymap_to_document_round_trip() {
    init_log();
    let doc = crate::layout::LayoutDocument::new("corne", "rt");
    let doc = doc.layers().add("base").unwrap();
    let doc = doc.layers().add("nav").unwrap();
    let doc = doc
        .layers()
        .get("base")
        .unwrap()
        .set_range(
            0,
            4,
            &[
                Binding::parse("&kp A").unwrap(),
                Binding::parse("&mt LCTRL ESC").unwrap(),
                Binding::parse("&kp LC(LA(DEL))").unwrap(),
                Binding::parse("&mo 1").unwrap(),
            ],
        )
        .unwrap();
    let doc = doc
        .layers()
        .get("nav")
        .unwrap()
        .fill(Binding::trans(), 4)
        .unwrap();
    let doc = doc.behaviors().add_hold_tap(HoldTap::new("hm")).unwrap();
    let doc = doc
        .behaviors()
        .add_combo({
            let mut c = Combo::new("combo_esc", vec![0, 1], Binding::parse("&kp ESC").unwrap());
            c.timeout_ms = Some(30);
            c.layers = vec![0, 1];
            c
        })
        .unwrap();
    let doc = doc
        .behaviors()
        .add_macro({
            let mut m = Macro::new("hi");
            m.bindings = vec![
                Binding::parse("&kp H").unwrap(),
                Binding::parse("&kp I").unwrap(),
            ];
            m.wait_ms = Some(40);
            m
        })
        .unwrap();

    let text = full_keymap(&doc, &FormatContext::default()).unwrap();
    let roots = crate::dts::parse_source(&text, "generated").unwrap();
    let back = extract_layout(&roots).unwrap().layout;

    assert_eq!(back.layer_names, doc.layer_names);
    assert_eq!(back.layers, doc.layers);
    assert_eq!(back.hold_taps, doc.hold_taps);
    assert_eq!(back.combos, doc.combos);
    assert_eq!(back.macros, doc.macros);
}

#[test]
fn param_values_distinguish_numbers_from_names() {
    let e = extract(
        r#"/ { keymap { compatible = "zmk,keymap"; base { bindings = <&lt 2 TAB>; }; }; };"#,
    );
    let binding = &e.layout.layers[0][0];
    assert_eq!(binding.params[0].value, ParamValue::Int(2));
    assert_eq!(binding.params[1].value, ParamValue::Name("TAB".into()));
}
