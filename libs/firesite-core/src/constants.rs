pub mod collection {
    pub const PAGE: &str = "Page";
    pub const FILE: &str = "File";
    pub const USER: &str = "User";
}

pub mod field {
    pub const ID: &str = "id";
    pub const LASTMOD: &str = "lastmod";
    pub const CONTENT: &str = "content";
    pub const USERNAME: &str = "username";
    pub const ROLES: &str = "roles";
}

pub mod role {
    pub const ADMIN: &str = "admin";
    pub const MEMBER: &str = "member";
}

pub mod session {
    pub const ANONYMOUS_USERNAME: &str = "<anonymous>";
    pub const DEFAULT_SALT_PREFIX: &str = "firesite";
    pub const LOGIN_ACTION: &str = "login";
}
