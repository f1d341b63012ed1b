// Parser unit tests that exercise the crate through its public entry points

mod test_program_parsing;
mod test_source_reconstruction;
