use indoc::indoc;

/// Declarative table files
pub mod tables {
    use super::*;

    pub const USERS: &str = indoc! {r#"
        -- sqlsync: declarativeTable=true
        CREATE TABLE users (
            id serial PRIMARY KEY,
            user_name varchar(255) NOT NULL,
            email text UNIQUE,
            created_at timestamptz DEFAULT now()
        );
    "#};

    /// `USERS` with `user_name` renamed
    pub const USERS_RENAMED: &str = indoc! {r#"
        -- sqlsync: declarativeTable=true
        CREATE TABLE users (
            id serial PRIMARY KEY,
            username varchar(255) NOT NULL,
            email text UNIQUE,
            created_at timestamptz DEFAULT now()
        );
    "#};

    /// `USERS` under a new table name, with one more column
    pub const ACCOUNTS: &str = indoc! {r#"
        -- sqlsync: declarativeTable=true
        CREATE TABLE accounts (
            id serial PRIMARY KEY,
            user_name varchar(255) NOT NULL,
            email text UNIQUE,
            created_at timestamptz DEFAULT now(),
            plan text NOT NULL DEFAULT 'free'
        );
    "#};

    /// `USERS` with a comment added and different whitespace
    pub const USERS_COMMENTED: &str = indoc! {r#"
        -- sqlsync: declarativeTable=true
        -- Application accounts
        CREATE TABLE users (
            id        serial PRIMARY KEY,
            user_name varchar(255) NOT NULL, -- login handle
            email     text UNIQUE,
            created_at timestamptz DEFAULT now()
        );
    "#};

    pub const PRODUCTS: &str = indoc! {r#"
        -- sqlsync: declarativeTable=true
        CREATE TABLE shop.products (
            id bigint PRIMARY KEY,
            price numeric NOT NULL DEFAULT 0
        );
    "#};

    /// `PRODUCTS` with `price` replaced by an unrelated column
    pub const PRODUCTS_COST: &str = indoc! {r#"
        -- sqlsync: declarativeTable=true
        CREATE TABLE shop.products (
            id bigint PRIMARY KEY,
            cost integer
        );
    "#};

    pub const ORDERS: &str = indoc! {r#"
        -- sqlsync: declarativeTable=true
        CREATE TABLE orders (
            id bigserial PRIMARY KEY,
            user_id integer NOT NULL REFERENCES users (id) ON DELETE CASCADE,
            note text
        );
    "#};
}

/// Ordinary (non-declarative) source files
pub mod plain {
    use super::*;

    pub const ACTIVE_USERS_VIEW: &str = indoc! {r#"
        CREATE OR REPLACE VIEW active_users AS
        SELECT id, user_name FROM users WHERE email IS NOT NULL;
    "#};

    pub const ACTIVE_USERS_VIEW_COMMENTED: &str = indoc! {r#"
        -- Users with a contact address
        CREATE OR REPLACE VIEW active_users AS
        /* keep in sync with the signup flow */
        SELECT id, user_name FROM users WHERE email IS NOT NULL;
    "#};

    pub const FUNCTIONS: &str = indoc! {r#"
        -- sqlsync: splitStatements=true
        CREATE OR REPLACE FUNCTION touch() RETURNS trigger AS $$
        BEGIN
            NEW.updated_at := now(); -- not a statement boundary
            RETURN NEW;
        END;
        $$ LANGUAGE plpgsql;

        CREATE OR REPLACE FUNCTION answer() RETURNS int AS $body$ SELECT 42; $body$ LANGUAGE sql;
    "#};

    /// `FUNCTIONS` with only `answer()` changed
    pub const FUNCTIONS_CHANGED: &str = indoc! {r#"
        -- sqlsync: splitStatements=true
        CREATE OR REPLACE FUNCTION touch() RETURNS trigger AS $$
        BEGIN
            NEW.updated_at := now(); -- not a statement boundary
            RETURN NEW;
        END;
        $$ LANGUAGE plpgsql;

        CREATE OR REPLACE FUNCTION answer() RETURNS int AS $body$ SELECT 43; $body$ LANGUAGE sql;
    "#};

    pub const CONFLICTING_DIRECTIVES: &str = indoc! {r#"
        -- sqlsync: declarativeTable=true, splitStatements=true
        CREATE TABLE t (id int);
    "#};

    pub const TABLE_WITH_INDEX: &str = indoc! {r#"
        -- sqlsync: declarativeTable=true
        CREATE TABLE t (id int);
        CREATE INDEX t_id_idx ON t (id);
    "#};
}
