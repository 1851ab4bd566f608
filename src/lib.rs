// Root workspace package; exists only to host dev-dependencies (cargo-husky hooks).
