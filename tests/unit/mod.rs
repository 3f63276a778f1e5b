/// Scenario tests for the pure engines
mod delivery_scenarios;
mod stats_scenarios;
