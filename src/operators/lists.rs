//! Static operator lists for tool versions that cannot report output arity themselves.

/// Operators that print text instead of writing a file.
pub const NO_OUTPUT_OPERATORS: &[&str] = &[
    "cdiread", "cmor", "codetab", "conv_cmor_table", "diff", "diffc", "diffn", "diffp",
    "diffv", "dump_cmor_table", "dumpmap", "filedes", "gmtcells", "gmtxyz", "gradsdes", "griddes",
    "griddes2", "gridverify", "info", "infoc", "infon", "infop", "infos", "infov",
    "map", "ncode", "ndate", "ngridpoints", "ngrids", "nlevel", "nmon", "npar",
    "ntime", "nvar", "nyear", "output", "outputarr", "outputbounds", "outputboundscpt", "outputcenter",
    "outputcenter2", "outputcentercpt", "outputext", "outputf", "outputfld", "outputint", "outputkey", "outputsrv",
    "outputtab", "outputtri", "outputts", "outputvector", "outputvrml", "outputxyz", "pardes", "partab",
    "partab2", "seinfo", "seinfoc", "seinfon", "seinfop", "showattribute", "showatts", "showattsglob",
    "showattsvar", "showcode", "showdate", "showformat", "showgrid", "showlevel", "showltype", "showmon",
    "showname", "showparam", "showstdname", "showtime", "showtimestamp", "showunit", "showvar", "showyear",
    "sinfo", "sinfoc", "sinfon", "sinfop", "sinfov", "spartab", "specinfo", "tinfo",
    "vardes", "vct", "vct2", "verifygrid", "vlist", "xinfon", "zaxisdes",
];

/// Operators that write exactly two files.
pub const TWO_OUTPUT_OPERATORS: &[&str] = &[
    "trend", "samplegridicon", "mrotuv", "eoftime", "eofspatial", "eof3dtime", "eof3dspatial", "eof3d",
    "eof", "complextorect", "complextopol",
];

/// Operators that write a variable number of files sharing an output prefix.
pub const MORE_OUTPUT_OPERATORS: &[&str] = &[
    "distgrid", "eofcoeff", "eofcoeff3d", "intyear", "scatter", "splitcode", "splitday", "splitgrid",
    "splithour", "splitlevel", "splitmon", "splitname", "splitparam", "splitrec", "splitseas", "splitsel",
    "splittabnum", "splitvar", "splityear", "splityearmon", "splitzaxis",
];

/// Operators missing from the `-h` listing of old tool versions.
pub const UNDOCUMENTED_OPERATORS: &[&str] = &[
    "anomaly", "beta", "boxavg", "change_e5lsm", "change_e5mask", "change_e5slm", "chisquare", "chvar",
    "cloudlayer", "cmd", "com", "command", "complextorect", "covar0", "covar0r", "daycount",
    "daylogs", "del29feb", "delday", "delete", "deltap", "deltap_fl", "delvar", "diffv",
    "divcoslat", "dumplogo", "dumplogs", "duplicate", "eca_r1mm", "enlargegrid", "ensrkhistspace", "ensrkhisttime",
    "eof3d", "eof3dspatial", "eof3dtime", "export_e5ml", "export_e5res", "fc2gp", "fc2sp", "fillmiss",
    "fisher", "fldcovar", "fldrms", "fourier", "fpressure", "gather", "gengrid", "geopotheight",
    "ggstat", "ggstats", "globavg", "gp2fc", "gradsdes", "gridverify", "harmonic", "hourcount",
    "hpressure", "ifs2icon", "import_e5ml", "import_e5res", "import_obs", "imtocomplex", "infos", "infov",
    "interpolate", "intgrid", "intgridbil", "intgridtraj", "intpoint", "isosurface", "lmavg", "lmean",
    "lmmean", "lmstd", "log", "lsmean", "meandiff2test", "mergegrid", "mod", "moncount",
    "monlogs", "mrotuv", "mrotuvb", "mulcoslat", "ncode", "ncopy", "nmltest", "normal",
    "nvar", "outputbounds", "outputboundscpt", "outputcenter", "outputcenter2", "outputcentercpt", "outputkey", "outputtri",
    "outputvector", "outputvrml", "pardup", "parmul", "pinfo", "pinfov", "pressure_fl", "pressure_hl",
    "read_e5ml", "remapcon1", "remapdis1", "retocomplex", "scalllogo", "scatter", "seascount", "select",
    "selgridname", "seloperator", "selvar", "selzaxisname", "setrcaname", "setvar", "showvar", "sinfov",
    "smemlogo", "snamelogo", "sort", "sortcode", "sortlevel", "sortname", "sorttaxis", "sorttimestamp",
    "sortvar", "sp2fc", "specinfo", "spectrum", "sperclogo", "splitvar", "stimelogo", "studentt",
    "template1", "template2", "test", "test2", "testdata", "thinout", "timcount", "timcovar",
    "tinfo", "transxy", "trms", "tstepcount", "vardes", "vardup", "varmul", "varquot2test",
    "varrms", "vertwind", "write_e5ml", "writegrid", "writerandom", "yearcount",
];

/// Operators that exit with [`DIFFERENCES_FOUND_EXIT_CODE`] when inputs differ.
pub const COMPARISON_OPERATORS: &[&str] = &["diff", "diffc", "diffn", "diffp", "diffv", "diffx"];

pub const DIFFERENCES_FOUND_EXIT_CODE: i32 = 1;

pub fn is_comparison(name: &str) -> bool {
    COMPARISON_OPERATORS.contains(&name)
}

/// Names following the `split*` convention write one file per split value.
pub fn is_split_family(name: &str) -> bool {
    name.starts_with("split")
}
