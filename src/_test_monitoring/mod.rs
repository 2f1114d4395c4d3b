/// **(internal)** Monitoring of plain prefix formulas, including the
/// output-determinism property.
mod _test_prefix_properties;

/// **(internal)** Monitoring of stutter-reduced prefix formulas.
mod _test_stutter_reduction;

/// **(internal)** Monitoring of formulas with quantifier alternation.
mod _test_quantifier_alternation;

/// **(internal)** Monitoring of formulas over function-produced trace sets.
mod _test_functions;

/// **(internal)** Slicing of input traces by a hypernode automaton.
mod _test_hna_slicing;

/// **(internal)** Utilities shared by the monitoring scenarios.
mod _test_util;
