// Code generated by emx-assetbox. DO NOT EDIT.

/// Register every embedded box with `registry`
pub fn register_boxes(registry: &mut ::emx_assetbox::BoxRegistry) -> Result<(), ::emx_assetbox::EmbedError> {
    registry.register(box_0_site()?)?;
    registry.register(box_1_docs()?)?;
    Ok(())
}

#[allow(unused_variables)]
fn box_0_site() -> Result<::emx_assetbox::AssetBox, ::emx_assetbox::EmbedError> {
    let mut builder = ::emx_assetbox::EmbeddedBoxBuilder::new("site", 1700000000);
    let dir_0_root = builder.dir("", 1700000000);
    let dir_1_css = builder.dir("css", 1700000011);
    let dir_2_img = builder.dir("img", 1700000000);
    let file_0_css_site_css = builder.file("css/site.css", 1700000004, b"body { margin: 0; }\n");
    let file_1_empty_txt = builder.file("empty.txt", 1700000008, b"");
    let file_2_img_dot_bin = builder.file("img/dot.bin", 1700000006, b"\x00\xff\x10$%}\x00\x00\x00\x00\x89PNG");
    let file_3_index_html = builder.file("index.html", 1700000002, b"<h1>{% block title %}Home{% endblock %}</h1>\n<p>$5 %}</p>\n");
    let file_4_odd_txt = builder.file("odd.txt", 1700000001, b"odd second\n");
    let file_5_old_txt = builder.file("old.txt", 315532799, b"before 1980\n");
    let file_6_raw_txt = builder.file("{%raw%}.txt", 1700000012, b"it\'s \"quoted\" \\ text\t\r\n");
    builder.link(dir_0_root, &[dir_1_css, dir_2_img, file_1_empty_txt, file_3_index_html, file_4_odd_txt, file_5_old_txt, file_6_raw_txt]);
    builder.link(dir_1_css, &[file_0_css_site_css]);
    builder.link(dir_2_img, &[file_2_img_dot_bin]);
    Ok(builder.finish())
}

#[allow(unused_variables)]
fn box_1_docs() -> Result<::emx_assetbox::AssetBox, ::emx_assetbox::EmbedError> {
    let mut builder = ::emx_assetbox::EmbeddedBoxBuilder::new("docs", 1600000000);
    let dir_0_root = builder.dir("", 1600000000);
    let file_0_readme_md = builder.file("readme.md", 1600000000, b"# Docs\n");
    builder.link(dir_0_root, &[file_0_readme_md]);
    Ok(builder.finish())
}
