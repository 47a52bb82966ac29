use rstest::rstest;
use starmap_core::model::validate::{validate_coordinates, HORIZONTAL_BOUND, MAX_NAME_CHARS, VERTICAL_BOUND};
use starmap_core::{validate_system, Planet, System};

#[rstest]
#[case::origin(0.0, 0.0, 0.0)]
#[case::horizontal_edges(HORIZONTAL_BOUND, -HORIZONTAL_BOUND, 0.0)]
#[case::vertical_top(0.0, 0.0, VERTICAL_BOUND)]
#[case::vertical_bottom(0.0, 0.0, -VERTICAL_BOUND)]
#[case::fractional(99.999, -99.999, 249.5)]
fn coordinates_on_or_inside_bounds_are_accepted(#[case] x: f64, #[case] y: f64, #[case] z: f64) {
    assert!(validate_coordinates(x, y, z).is_ok());
    assert!(validate_system(&System::new("Edge", "Euclid", x, y, z)).is_ok());
}

#[rstest]
#[case::x_over(100.01, 0.0, 0.0, "x")]
#[case::x_under(-100.5, 0.0, 0.0, "x")]
#[case::y_over(0.0, 101.0, 0.0, "y")]
#[case::z_over(0.0, 0.0, 250.001, "z")]
#[case::z_under(0.0, 0.0, -251.0, "z")]
#[case::not_a_number(f64::NAN, 0.0, 0.0, "x")]
#[case::infinite(0.0, f64::INFINITY, 0.0, "y")]
fn coordinates_outside_bounds_name_the_axis(
    #[case] x: f64,
    #[case] y: f64,
    #[case] z: f64,
    #[case] field: &str,
) {
    let err = validate_coordinates(x, y, z).unwrap_err();
    assert_eq!(err.field, field);
}

#[test]
fn name_length_limit_counts_characters() {
    let at_limit = "é".repeat(MAX_NAME_CHARS);
    assert!(validate_system(&System::new(at_limit, "Euclid", 0.0, 0.0, 0.0)).is_ok());

    let over_limit = "a".repeat(MAX_NAME_CHARS + 1);
    let err = validate_system(&System::new(over_limit, "Euclid", 0.0, 0.0, 0.0)).unwrap_err();
    assert_eq!(err.field, "name");
}

#[rstest]
#[case("")]
#[case("   ")]
#[case("Bad<Name>")]
#[case("Pipe|Dream")]
fn unusable_system_names_are_rejected(#[case] name: &str) {
    let err = validate_system(&System::new(name, "Euclid", 0.0, 0.0, 0.0)).unwrap_err();
    assert_eq!(err.field, "name");
}

#[test]
fn duplicate_planet_names_are_rejected() {
    let mut system = System::new("Twin", "Euclid", 0.0, 0.0, 0.0);
    system.planets.push(Planet::new("Rock"));
    system.planets.push(Planet::new("Rock"));

    let err = validate_system(&system).unwrap_err();
    assert_eq!(err.field, "planets[1].name");
}
