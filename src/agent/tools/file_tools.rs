use super::ToolContext;

pub fn read(ctx: &ToolContext<'_>, path: &str, max_bytes: usize) -> anyhow::Result<String> {
    crate::discovery::read_file_under_root(ctx.workspace, path, max_bytes)
}

pub fn write(ctx: &ToolContext<'_>, path: &str, content: &str) -> anyhow::Result<String> {
    let res = crate::file_ops::write_file_under_root(ctx.workspace, path, content)?;
    let verb = if res.created { "created" } else { "updated" };
    Ok(format!("{verb} {} ({} bytes)", res.path, res.bytes))
}

pub fn list(ctx: &ToolContext<'_>, max: usize) -> anyhow::Result<String> {
    let items = crate::discovery::list_files(ctx.workspace, max);
    if items.is_empty() {
        return Ok("workspace is empty".into());
    }
    Ok(serde_json::to_string(&items)?)
}

pub fn search(ctx: &ToolContext<'_>, pattern: &str, max: usize) -> anyhow::Result<String> {
    let items = crate::discovery::search_files(ctx.workspace, pattern, max)?;
    if items.is_empty() {
        return Ok(format!("no files match {pattern}"));
    }
    Ok(serde_json::to_string(&items)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::tempdir;

    fn ctx<'a>(workspace: &'a Path) -> ToolContext<'a> {
        ToolContext { chat_jid: "c@g.us", group_folder: "g", workspace, outbox: workspace }
    }

    #[test]
    fn list_and_search_on_empty_workspace_are_descriptive() {
        let dir = tempdir().unwrap();
        assert_eq!(list(&ctx(dir.path()), 10).unwrap(), "workspace is empty");
        assert!(search(&ctx(dir.path()), "x", 10).unwrap().starts_with("no files match"));
    }

    #[test]
    fn write_then_list_returns_json_entries() {
        let dir = tempdir().unwrap();
        assert!(write(&ctx(dir.path()), "a.txt", "abc").unwrap().starts_with("created a.txt"));
        assert!(write(&ctx(dir.path()), "a.txt", "abcd").unwrap().starts_with("updated a.txt"));
        let listed: serde_json::Value = serde_json::from_str(&list(&ctx(dir.path()), 10).unwrap()).unwrap();
        assert_eq!(listed[0]["path"], "a.txt");
        assert_eq!(read(&ctx(dir.path()), "a.txt", 64).unwrap(), "abcd");
    }
}
