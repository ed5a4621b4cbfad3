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
    let file_0_css_site_css = builder.compressed_file("css/site.css", 1700000004, "GhPg5:T7<l<ldud9$b_f;D>=UW9\"'\\8[en'")?;
    let file_1_empty_txt = builder.compressed_file("empty.txt", 1700000008, "GhN6\"!!!!\"")?;
    let file_2_img_dot_bin = builder.compressed_file("img/dot.bin", 1700000006, "GhQ[&0;,%Cb5_[9!IjG:)&iZG")?;
    let file_3_index_html = builder.compressed_file("index.html", 1700000002, "GhTLG0XRl]<Ck9S:X2uhaXkP*<D]gjaNmQa$Dus^5f?Z<D=iDE\\82N=<(t-@!]r\"7.:s0f")?;
    let file_4_odd_txt = builder.compressed_file("odd.txt", 1700000001, "GhU>:8Ppm2:!V'Xi;rurL'-9")?;
    let file_5_old_txt = builder.compressed_file("old.txt", 315532799, "GhPe_:!51^<A:ee0]3!4)VbF6")?;
    let file_6_raw_txt = builder.compressed_file("{%raw%}.txt", 1700000012, "GhU=l;(ksH.P/gt8PN&[Lf#QlXXN/hjT5EccN`h")?;
    builder.link(dir_0_root, &[dir_1_css, dir_2_img, file_1_empty_txt, file_3_index_html, file_4_odd_txt, file_5_old_txt, file_6_raw_txt]);
    builder.link(dir_1_css, &[file_0_css_site_css]);
    builder.link(dir_2_img, &[file_2_img_dot_bin]);
    Ok(builder.finish())
}

#[allow(unused_variables)]
fn box_1_docs() -> Result<::emx_assetbox::AssetBox, ::emx_assetbox::EmbedError> {
    let mut builder = ::emx_assetbox::EmbeddedBoxBuilder::new("docs", 1600000000);
    let dir_0_root = builder.dir("", 1600000000);
    let file_0_readme_md = builder.compressed_file("readme.md", 1600000000, "GhQ(sE61m.joPMejT3s")?;
    builder.link(dir_0_root, &[file_0_readme_md]);
    Ok(builder.finish())
}
